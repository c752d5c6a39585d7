use crate::error::SanctionsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sanctioning authority a dataset originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    Un,
    Eu,
    Us,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Un, Source::Eu, Source::Us];

    /// Short tag used on the command line and in run summaries.
    pub fn tag(&self) -> &'static str {
        match self {
            Source::Un => "UN",
            Source::Eu => "EU",
            Source::Us => "US",
        }
    }

    /// Prefix of every canonical id produced from this source.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Source::Un => "UN",
            Source::Eu => "EU",
            Source::Us => "OFAC",
        }
    }

    /// Value written into `CanonicalRecord::source`.
    pub fn record_source(&self) -> &'static str {
        match self {
            Source::Un => "UN",
            Source::Eu => "EU",
            Source::Us => "US-OFAC",
        }
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            Source::Un => "un",
            Source::Eu => "eu",
            Source::Us => "us",
        }
    }

    /// Name of the per-source canonical JSON file.
    pub fn output_file_name(&self) -> String {
        format!("{}_sanctions.json", self.file_stem())
    }

    /// Name of the raw download kept in the temp directory.
    pub fn download_file_name(&self) -> String {
        format!("{}_sanctions.xml", self.file_stem())
    }

    pub fn canonical_id(&self, native_id: &str) -> String {
        format!("{}-{}", self.id_prefix(), native_id)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Source {
    type Err = SanctionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "un" => Ok(Source::Un),
            "eu" => Ok(Source::Eu),
            "us" | "ofac" | "us-ofac" => Ok(Source::Us),
            other => Err(SanctionsError::UnknownSource(other.to_string())),
        }
    }
}

/// Parse a comma-separated source list, preserving order and dropping repeats.
pub fn parse_source_list(list: &str) -> Result<Vec<Source>, SanctionsError> {
    let mut sources = Vec::new();
    for part in list.split(',').filter(|p| !p.trim().is_empty()) {
        push_unique(&mut sources, part.parse()?);
    }
    Ok(sources)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Individual,
    Entity,
    #[default]
    #[serde(other)]
    Unknown,
}

impl EntityType {
    /// Map a source-specific subject code onto the canonical classification.
    pub fn classify(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "p" | "individual" | "person" => EntityType::Individual,
            "e" | "entity" | "enterprise" => EntityType::Entity,
            _ => EntityType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Individual => "INDIVIDUAL",
            EntityType::Entity => "ENTITY",
            EntityType::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identification {
    #[serde(rename = "type")]
    pub id_type: String,
    pub number: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanctionEntry {
    pub program: String,
    #[serde(rename = "startDate", default)]
    pub start_date: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Details {
    /// Alternative names; treated as a set, order carries no meaning.
    pub aliases: Vec<String>,
    pub birth_date: String,
    pub addresses: Vec<String>,
    pub nationalities: Vec<String>,
    pub identifications: Vec<Identification>,
    /// One entry per contributing source program; never deduplicated.
    pub sanctions: Vec<SanctionEntry>,
}

/// Source-independent representation of one sanctioned party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub entity_type: EntityType,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub programs: Vec<String>,
    pub source: String,
    #[serde(default)]
    pub details: Details,
}

impl CanonicalRecord {
    pub fn new(source: Source, native_id: &str, name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: source.canonical_id(native_id),
            name: name.into(),
            entity_type,
            country: String::new(),
            programs: Vec::new(),
            source: source.record_source().to_string(),
            details: Details::default(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty() && !self.name.trim().is_empty()
    }

    /// Contributing authorities, in the order they were merged.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.source.split(',').map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn add_program(&mut self, program: &str) {
        let program = program.trim();
        if !program.is_empty() {
            push_unique(&mut self.programs, program.to_string());
        }
    }

    /// Add an alias unless it is blank or repeats the primary name.
    pub fn add_alias(&mut self, alias: &str) {
        let alias = alias.trim();
        if !alias.is_empty() && alias != self.name {
            push_unique(&mut self.details.aliases, alias.to_string());
        }
    }

    pub fn add_nationality(&mut self, nationality: &str) {
        let nationality = nationality.trim();
        if !nationality.is_empty() {
            push_unique(&mut self.details.nationalities, nationality.to_string());
        }
    }

    pub fn add_address(&mut self, address: String) {
        push_unique(&mut self.details.addresses, address);
    }

    pub fn add_identification(&mut self, identification: Identification) {
        push_unique(&mut self.details.identifications, identification);
    }

    /// Fold `other` into this record.
    ///
    /// Collection fields are unioned and scalar fields keep the first
    /// non-empty value. Sanctions are appended in full for a newly contributing
    /// source; from an already listed source only entries for programs this
    /// record does not carry yet are taken.
    pub fn merge_from(&mut self, other: &CanonicalRecord) {
        let new_sources: Vec<String> = other
            .sources()
            .filter(|s| !self.sources().any(|existing| existing == *s))
            .map(str::to_string)
            .collect();

        if !new_sources.is_empty() {
            let mut joined: Vec<String> = self.sources().map(str::to_string).collect();
            joined.extend(new_sources.iter().cloned());
            self.source = joined.join(",");
            self.details
                .sanctions
                .extend(other.details.sanctions.iter().cloned());
        } else {
            let unseen: Vec<SanctionEntry> = other
                .details
                .sanctions
                .iter()
                .filter(|entry| !self.programs.contains(&entry.program))
                .cloned()
                .collect();
            self.details.sanctions.extend(unseen);
        }

        if self.name.trim().is_empty() {
            self.name = other.name.clone();
        }
        if self.entity_type == EntityType::Unknown {
            self.entity_type = other.entity_type;
        }
        if self.country.is_empty() {
            self.country = other.country.clone();
        }
        if self.details.birth_date.is_empty() {
            self.details.birth_date = other.details.birth_date.clone();
        }

        union_into(&mut self.programs, &other.programs);
        union_into(&mut self.details.aliases, &other.details.aliases);
        self.details.aliases.retain(|alias| *alias != self.name);
        union_into(&mut self.details.addresses, &other.details.addresses);
        union_into(&mut self.details.nationalities, &other.details.nationalities);
        union_into(&mut self.details.identifications, &other.details.identifications);
    }
}

/// Push `item` if it is not already present. Returns whether it was added.
pub fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if items.contains(&item) {
        false
    } else {
        items.push(item);
        true
    }
}

fn union_into<T: PartialEq + Clone>(target: &mut Vec<T>, other: &[T]) {
    for item in other {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}
