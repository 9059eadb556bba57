use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity document types accepted by the census registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Dni,
    Nie,
    Passport,
}

impl DocumentType {
    pub const ALL: [DocumentType; 3] = [DocumentType::Dni, DocumentType::Nie, DocumentType::Passport];

    /// A local document is any type issued by the local jurisdiction,
    /// i.e. everything except a passport.
    #[inline]
    pub fn is_local(&self) -> bool {
        *self != DocumentType::Passport
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "dni" => Some(DocumentType::Dni),
            "nie" => Some(DocumentType::Nie),
            "passport" => Some(DocumentType::Passport),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Dni => "dni",
            DocumentType::Nie => "nie",
            DocumentType::Passport => "passport",
        }
    }

    /// Translation key for caller-side rendering.
    pub fn label_key(&self) -> String {
        format!("census.person.document_type.{}", self.as_str())
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
    Other,
    Undisclosed,
}

impl Gender {
    pub const ALL: [Gender; 4] = [Gender::Female, Gender::Male, Gender::Other, Gender::Undisclosed];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "female" => Some(Gender::Female),
            "male" => Some(Gender::Male),
            "other" => Some(Gender::Other),
            "undisclosed" => Some(Gender::Undisclosed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
            Gender::Other => "other",
            Gender::Undisclosed => "undisclosed",
        }
    }

    pub fn label_key(&self) -> String {
        format!("census.person.gender.{}", self.as_str())
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Membership commitment levels a person can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipLevel {
    Follower,
    Member,
    Activist,
}

impl MembershipLevel {
    pub const ALL: [MembershipLevel; 3] = [
        MembershipLevel::Follower,
        MembershipLevel::Member,
        MembershipLevel::Activist,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "follower" => Some(MembershipLevel::Follower),
            "member" => Some(MembershipLevel::Member),
            "activist" => Some(MembershipLevel::Activist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipLevel::Follower => "follower",
            MembershipLevel::Member => "member",
            MembershipLevel::Activist => "activist",
        }
    }

    pub fn label_key(&self) -> String {
        format!("census.person.membership_level.{}", self.as_str())
    }
}

impl fmt::Display for MembershipLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a person in the registry.
///
/// Only `enabled` allows the local authorization to be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PersonState {
    #[default]
    Pending,
    Enabled,
    Cancelled,
    Trashed,
}

impl PersonState {
    #[inline]
    pub fn is_enabled(&self) -> bool {
        *self == PersonState::Enabled
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonState::Pending => "pending",
            PersonState::Enabled => "enabled",
            PersonState::Cancelled => "cancelled",
            PersonState::Trashed => "trashed",
        }
    }
}

impl fmt::Display for PersonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Registry-issued opaque person identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub i64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite `<local_user_id>@<system_identifier>` lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedId {
    pub local_id: String,
    pub system: String,
}

impl QualifiedId {
    pub fn new(local_id: impl Into<String>, system: impl Into<String>) -> Self {
        QualifiedId {
            local_id: local_id.into(),
            system: system.into(),
        }
    }
}

impl fmt::Display for QualifiedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_id, self.system)
    }
}

/// Either key form accepted by the registry's person endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PersonRef {
    Id(PersonId),
    Qualified(QualifiedId),
}

impl PersonRef {
    /// The path segment used in registry URLs.
    pub fn as_path_segment(&self) -> String {
        match self {
            PersonRef::Id(id) => id.to_string(),
            PersonRef::Qualified(qid) => qid.to_string(),
        }
    }
}

impl From<PersonId> for PersonRef {
    fn from(id: PersonId) -> Self {
        PersonRef::Id(id)
    }
}

impl From<QualifiedId> for PersonRef {
    fn from(qid: QualifiedId) -> Self {
        PersonRef::Qualified(qid)
    }
}

impl fmt::Display for PersonRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_path_segment())
    }
}

/// Read-only snapshot of a person as the registry reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub first_name: String,
    pub last_name1: String,
    #[serde(default)]
    pub last_name2: Option<String>,

    pub document_type: DocumentType,
    pub document_id: String,

    pub born_at: NaiveDate,
    pub gender: Gender,

    pub address: String,
    pub postal_code: String,

    #[serde(default)]
    pub document_scope_code: Option<String>,
    #[serde(default)]
    pub address_scope_code: Option<String>,
    #[serde(default)]
    pub scope_code: Option<String>,

    #[serde(default)]
    pub membership_level: Option<MembershipLevel>,

    #[serde(default)]
    pub state: PersonState,
}

impl Person {
    /// Age in whole years on the given date.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        use chrono::Datelike;

        let mut years = today.year() - self.born_at.year();
        if (today.month(), today.day()) < (self.born_at.month(), self.born_at.day()) {
            years -= 1;
        }
        years.max(0) as u32
    }
}
