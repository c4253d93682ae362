use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// The five contact attributes CRM records are keyed on. The serialized names
/// are the CRM property names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactField {
    Email,
    FirstName,
    LastName,
    Phone,
    Company,
}

impl ContactField {
    pub const ALL: [ContactField; 5] = [
        ContactField::Email,
        ContactField::FirstName,
        ContactField::LastName,
        ContactField::Phone,
        ContactField::Company,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::FirstName => "firstname",
            Self::LastName => "lastname",
            Self::Phone => "phone",
            Self::Company => "company",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "email" => Some(Self::Email),
            "firstname" => Some(Self::FirstName),
            "lastname" => Some(Self::LastName),
            "phone" => Some(Self::Phone),
            "company" => Some(Self::Company),
            _ => None,
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized form used whenever headers are compared: lowercase, with every
/// non-alphanumeric character removed, so "First Name", "first_name" and
/// "FIRSTNAME" compare equal.
#[must_use]
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// A contact derived from one spreadsheet row.
///
/// Fields hold resolved, non-empty values only; anything that resolved to an
/// empty string is absent rather than present-but-blank, so an upsert never
/// wipes an existing CRM value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl CanonicalContact {
    #[must_use]
    pub fn get(&self, field: ContactField) -> Option<&str> {
        match field {
            ContactField::Email => self.email.as_deref(),
            ContactField::FirstName => self.firstname.as_deref(),
            ContactField::LastName => self.lastname.as_deref(),
            ContactField::Phone => self.phone.as_deref(),
            ContactField::Company => self.company.as_deref(),
        }
    }

    pub fn field_mut(&mut self, field: ContactField) -> &mut Option<String> {
        match field {
            ContactField::Email => &mut self.email,
            ContactField::FirstName => &mut self.firstname,
            ContactField::LastName => &mut self.lastname,
            ContactField::Phone => &mut self.phone,
            ContactField::Company => &mut self.company,
        }
    }

    #[must_use]
    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.is_empty())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        ContactField::ALL.iter().all(|f| self.get(*f).is_none())
    }

    /// Property bag for CRM create/update calls: resolved, non-empty fields
    /// only, in a stable order.
    #[must_use]
    pub fn property_bag(&self) -> BTreeMap<&'static str, &str> {
        let mut bag = BTreeMap::new();
        for field in ContactField::ALL {
            if let Some(value) = self.get(field) {
                if !value.is_empty() {
                    bag.insert(field.as_str(), value);
                }
            }
        }
        bag
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("unknown contact field '{0}' (expected one of email, firstname, lastname, phone, company)")]
    UnknownField(String),
    #[error("source header for '{field}' has no alphanumeric characters")]
    BlankHeader { field: ContactField },
}

/// Caller-supplied mapping from canonical field to source header, validated
/// when it is built: field names must be canonical and every source header
/// must survive normalization. An empty mapping is legal and means "no
/// explicit mapping" (heuristic matching applies).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ExplicitMapping {
    entries: BTreeMap<ContactField, String>,
}

impl ExplicitMapping {
    pub fn new(
        entries: impl IntoIterator<Item = (ContactField, String)>,
    ) -> Result<Self, MappingError> {
        let entries: BTreeMap<ContactField, String> = entries.into_iter().collect();
        for (field, header) in &entries {
            if normalize_header(header).is_empty() {
                return Err(MappingError::BlankHeader { field: *field });
            }
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub fn get(&self, field: ContactField) -> Option<&str> {
        self.entries.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContactField, &str)> {
        self.entries.iter().map(|(f, h)| (*f, h.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl TryFrom<BTreeMap<String, String>> for ExplicitMapping {
    type Error = MappingError;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut entries = BTreeMap::new();
        for (name, header) in raw {
            let field =
                ContactField::parse(&name).ok_or_else(|| MappingError::UnknownField(name))?;
            entries.insert(field, header);
        }
        Self::new(entries)
    }
}

impl From<ExplicitMapping> for BTreeMap<String, String> {
    fn from(mapping: ExplicitMapping) -> Self {
        mapping
            .entries
            .into_iter()
            .map(|(f, h)| (f.as_str().to_string(), h))
            .collect()
    }
}
