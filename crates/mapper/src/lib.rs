//! Column resolution: turns one spreadsheet row into a [`CanonicalContact`].
//!
//! A row arrives as parallel `headers` / `values` arrays. Resolution runs in
//! one of two modes:
//!
//! - **explicit**: the caller supplied a mapping from canonical field to
//!   source header. Only mapped fields resolve; a mapped header that does not
//!   appear in the row leaves its field unresolved. Heuristics are never
//!   consulted in this mode.
//! - **heuristic**: each canonical field is matched against an alias table
//!   of common header spellings. The leftmost matching column wins.
//!
//! Headers are compared in normalized form (lowercased, non-alphanumerics
//! stripped), so "First Name", "first_name" and "FIRSTNAME" are the same
//! column. After resolution the email is trimmed and lowercased, and values
//! that resolved to the empty string are dropped so an upsert never blanks an
//! existing CRM property.

use log::debug;
use sheetbridge_protocol::{normalize_header, CanonicalContact, ContactField, ExplicitMapping};

/// Common header spellings, matched after normalization.
const fn aliases(field: ContactField) -> &'static [&'static str] {
    match field {
        ContactField::Email => &["email", "e-mail", "mail"],
        ContactField::FirstName => &["first name", "firstname", "first_name", "given name"],
        ContactField::LastName => &["last name", "lastname", "last_name", "surname"],
        ContactField::Phone => &["phone", "phone number", "mobile", "mobile phone"],
        ContactField::Company => &["company", "account", "organisation", "organization"],
    }
}

/// Map one row onto the canonical contact model.
///
/// `values` may be shorter or longer than `headers`; a missing or `None`
/// value reads as the empty string.
#[must_use]
pub fn map_row(
    headers: &[String],
    values: &[Option<String>],
    mapping: Option<&ExplicitMapping>,
) -> CanonicalContact {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut contact = CanonicalContact::default();

    match mapping.filter(|m| !m.is_empty()) {
        Some(mapping) => {
            for (field, wanted) in mapping.iter() {
                let wanted = normalize_header(wanted);
                if let Some(idx) = normalized.iter().position(|h| *h == wanted) {
                    *contact.field_mut(field) = Some(value_at(values, idx));
                } else {
                    debug!("mapped header '{wanted}' not present in row, leaving {field} unset");
                }
            }
        }
        None => {
            for field in ContactField::ALL {
                let hit = normalized
                    .iter()
                    .position(|h| aliases(field).iter().any(|a| normalize_header(a) == *h));
                if let Some(idx) = hit {
                    *contact.field_mut(field) = Some(value_at(values, idx));
                }
            }
        }
    }

    if let Some(email) = contact.email.take() {
        contact.email = Some(email.trim().to_lowercase());
    }
    for field in ContactField::ALL {
        let slot = contact.field_mut(field);
        if slot.as_deref().is_some_and(str::is_empty) {
            *slot = None;
        }
    }
    contact
}

fn value_at(values: &[Option<String>], idx: usize) -> String {
    values
        .get(idx)
        .and_then(Clone::clone)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn values(cells: &[&str]) -> Vec<Option<String>> {
        cells.iter().map(|c| Some((*c).to_string())).collect()
    }

    #[test]
    fn heuristics_resolve_common_spelling_variants() {
        let contact = map_row(
            &headers(&["E-Mail", "Given Name", "SURNAME", "Mobile Phone", "Organisation"]),
            &values(&["A@B.com", "Ada", "Lovelace", "+44 1", "Analytical"]),
            None,
        );
        assert_eq!(contact.email.as_deref(), Some("a@b.com"));
        assert_eq!(contact.firstname.as_deref(), Some("Ada"));
        assert_eq!(contact.lastname.as_deref(), Some("Lovelace"));
        assert_eq!(contact.phone.as_deref(), Some("+44 1"));
        assert_eq!(contact.company.as_deref(), Some("Analytical"));
    }

    #[test]
    fn leftmost_matching_column_wins() {
        let contact = map_row(
            &headers(&["Email", "Mail"]),
            &values(&["first@x.com", "second@x.com"]),
            None,
        );
        assert_eq!(contact.email.as_deref(), Some("first@x.com"));
    }

    #[test]
    fn leftmost_column_wins_even_when_its_value_is_blank() {
        let contact = map_row(
            &headers(&["Email", "Mail"]),
            &values(&["", "second@x.com"]),
            None,
        );
        assert_eq!(contact.email, None);
    }

    #[test]
    fn values_shorter_than_headers_read_as_empty() {
        let contact = map_row(
            &headers(&["First Name", "Last Name"]),
            &values(&["Ada"]),
            None,
        );
        assert_eq!(contact.firstname.as_deref(), Some("Ada"));
        assert_eq!(contact.lastname, None);
    }

    #[test]
    fn null_cells_read_as_empty() {
        let contact = map_row(
            &headers(&["Email", "Phone"]),
            &[Some("a@b.com".to_string()), None],
            None,
        );
        assert_eq!(contact.email.as_deref(), Some("a@b.com"));
        assert_eq!(contact.phone, None);
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        let contact = map_row(&headers(&["Email"]), &values(&["  Ada@Example.COM "]), None);
        assert_eq!(contact.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn other_fields_keep_their_raw_value() {
        let contact = map_row(&headers(&["First Name"]), &values(&[" Ada "]), None);
        assert_eq!(contact.firstname.as_deref(), Some(" Ada "));
    }

    #[test]
    fn explicit_mapping_suppresses_heuristics() {
        let mapping = ExplicitMapping::new([(ContactField::Phone, "Contact No".to_string())])
            .expect("valid mapping");
        let contact = map_row(
            &headers(&["Email", "Contact No"]),
            &values(&["a@b.com", "123"]),
            Some(&mapping),
        );
        // Email has an obvious alias match but is not in the mapping.
        assert_eq!(contact.email, None);
        assert_eq!(contact.phone.as_deref(), Some("123"));
    }

    #[test]
    fn explicit_mapping_matches_headers_after_normalization() {
        let mapping = ExplicitMapping::new([(ContactField::Email, "E-Mail Address".to_string())])
            .expect("valid mapping");
        let contact = map_row(
            &headers(&["email address"]),
            &values(&["a@b.com"]),
            Some(&mapping),
        );
        assert_eq!(contact.email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn mapped_header_absent_from_row_leaves_field_unset() {
        let mapping = ExplicitMapping::new([
            (ContactField::Email, "Work Email".to_string()),
            (ContactField::Company, "Employer".to_string()),
        ])
        .expect("valid mapping");
        let contact = map_row(
            &headers(&["Employer"]),
            &values(&["Initech"]),
            Some(&mapping),
        );
        assert_eq!(contact.email, None);
        assert_eq!(contact.company.as_deref(), Some("Initech"));
    }

    #[test]
    fn empty_explicit_mapping_falls_back_to_heuristics() {
        let mapping = ExplicitMapping::default();
        let contact = map_row(
            &headers(&["Email"]),
            &values(&["a@b.com"]),
            Some(&mapping),
        );
        assert_eq!(contact.email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn unmatched_row_yields_an_empty_contact() {
        let contact = map_row(
            &headers(&["Favourite Colour"]),
            &values(&["teal"]),
            None,
        );
        assert!(contact.is_empty());
        assert!(!contact.has_email());
    }
}
