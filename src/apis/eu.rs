use super::Collector;
use crate::error::{ParseError, RecordError};
use crate::parser::fields::{assemble_address, assemble_date, coalesce_name, first_date};
use crate::parser::xml::{Node, XmlDocument};
use crate::types::{CanonicalRecord, EntityType, Identification, SanctionEntry, Source};
use tracing::{debug, info, warn};

/// EU placeholder for "no country".
const NO_COUNTRY: &str = "00";

/// EU Financial Sanctions Files export (`export/sanctionEntity`).
pub struct EuCollector {
    url: String,
    alt_url: Option<String>,
}

impl EuCollector {
    pub fn new(url: impl Into<String>, alt_url: Option<String>) -> Self {
        Self {
            url: url.into(),
            alt_url,
        }
    }

    fn parse_entity(&self, node: Node<'_>) -> Result<CanonicalRecord, RecordError> {
        let logical_id = node.attr("logicalId").ok_or(RecordError::MissingField("logicalId"))?;

        let entity_type = node
            .child("subjectType")
            .and_then(|s| s.attr("classificationCode"))
            .map(EntityType::classify)
            .unwrap_or(EntityType::Unknown);

        let names: Vec<String> = node
            .children("nameAlias")
            .into_iter()
            .filter_map(|alias| {
                coalesce_name([alias.attr("wholeName")]).or_else(|| {
                    coalesce_name([
                        alias.attr("firstName"),
                        alias.attr("middleName"),
                        alias.attr("lastName"),
                    ])
                })
            })
            .collect();
        let (name, aliases) = names
            .split_first()
            .ok_or_else(|| RecordError::MissingName(Source::Eu.canonical_id(logical_id)))?;

        let mut record = CanonicalRecord::new(Source::Eu, logical_id, name.clone(), entity_type);
        for alias in aliases {
            record.add_alias(alias);
        }

        for citizenship in node.children("citizenship") {
            if let Some(code) = country_code(citizenship) {
                record.add_nationality(code);
            }
        }
        record.country = record.details.nationalities.first().cloned().unwrap_or_default();

        record.details.birth_date = first_date(node.children("birthdate").into_iter().map(|b| {
            assemble_date(
                b.value("birthdate"),
                b.value("year"),
                b.value("monthOfYear"),
                b.value("dayOfMonth"),
            )
        }))
        .unwrap_or_default();

        for address in node.children("address") {
            let parts = [
                address.value("street"),
                address.value("poBox"),
                address.value("city"),
                address.value("region"),
                address.value("zipCode"),
                country_code(address),
            ];
            if let Some(address) = assemble_address(parts) {
                record.add_address(address);
            }
        }

        let reason = node
            .children("remark")
            .into_iter()
            .find_map(|r| r.text())
            .unwrap_or_default()
            .to_string();
        for regulation in node.children("regulation") {
            let Some(program) = regulation_program(regulation) else {
                continue;
            };
            if record.programs.iter().any(|p| p == program) {
                continue;
            }
            record.add_program(program);
            record.details.sanctions.push(SanctionEntry {
                program: program.to_string(),
                start_date: regulation
                    .attr("entryIntoForceDate")
                    .or_else(|| regulation.attr("publicationDate"))
                    .unwrap_or_default()
                    .to_string(),
                reason: reason.clone(),
            });
        }

        for identification in node.children("identification") {
            let id_type = identification
                .value("identificationTypeDescription")
                .or_else(|| identification.value("identificationTypeCode"));
            let (Some(id_type), Some(number)) = (id_type, identification.value("number")) else {
                continue;
            };
            record.add_identification(Identification {
                id_type: id_type.to_string(),
                number: number.to_string(),
                country: country_code(identification).unwrap_or_default().to_string(),
            });
        }

        Ok(record)
    }
}

/// ISO-2 country from either the attribute form or a nested `country/code` element.
fn country_code<'a>(node: Node<'a>) -> Option<&'a str> {
    node.value("countryIso2Code")
        .or_else(|| node.child_text("country/code"))
        .filter(|code| *code != NO_COUNTRY)
}

fn regulation_program<'a>(regulation: Node<'a>) -> Option<&'a str> {
    regulation.attr("programme").or_else(|| {
        regulation
            .child("regulationSummary")
            .and_then(|s| s.attr("numberTitle").or_else(|| s.text()))
    })
}

impl Collector for EuCollector {
    fn source(&self) -> Source {
        Source::Eu
    }

    fn endpoints(&self) -> Vec<String> {
        std::iter::once(self.url.clone())
            .chain(self.alt_url.clone())
            .collect()
    }

    fn parse(&self, raw: &[u8]) -> Result<Vec<CanonicalRecord>, ParseError> {
        debug!("EuCollector: start bytes_len={}", raw.len());
        let doc = XmlDocument::parse(raw)?;
        match doc.namespace() {
            Some(ns) => info!("EU payload namespace: {}", ns),
            None => info!("EU payload has no namespace"),
        }

        let entities = doc.root().descendants("sanctionEntity");
        info!("Found {} EU sanction entities", entities.len());

        let mut records = Vec::with_capacity(entities.len());
        let mut skipped = 0;
        for entity in entities {
            match self.parse_entity(entity) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(source = "EU", "Skipping record: {}", e);
                    skipped += 1;
                }
            }
        }

        info!("Parsed {} EU records ({} skipped)", records.len(), skipped);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<export xmlns="http://eu.europa.ec/fpi/fsd/export" generationDate="2024-05-01T10:00:00">
  <sanctionEntity designationDate="2016-06-01" logicalId="100" euReferenceNumber="EU.1.1">
    <regulation programme="PRK" entryIntoForceDate="2016-06-02" publicationDate="2016-06-01">
      <regulationSummary regulationType="regulation" numberTitle="2016/841"/>
    </regulation>
    <regulation programme="PRK" publicationDate="2017-01-01"/>
    <remark>Supreme Leader.</remark>
    <subjectType code="person" classificationCode="P"/>
    <nameAlias firstName="Jong Un" lastName="Kim" wholeName="Kim Jong Un" strong="true"/>
    <nameAlias firstName="Jong-un" lastName="Kim"/>
    <nameAlias wholeName="Kim Jong Un"/>
    <citizenship countryIso2Code="KP"/>
    <citizenship countryIso2Code="00"/>
    <birthdate birthdate="0000-00-00" year="1984" monthOfYear="1" dayOfMonth="8"/>
    <birthdate year="1983"/>
    <address city="Pyongyang" countryIso2Code="KP" street=""/>
    <identification identificationTypeCode="passport" identificationTypeDescription="National passport" number="836410001" countryIso2Code="KP"/>
  </sanctionEntity>
  <sanctionEntity logicalId="200">
    <subjectType classificationCode="E"/>
    <nameAlias wholeName=""/>
  </sanctionEntity>
  <sanctionEntity logicalId="300">
    <subjectType classificationCode="X"/>
    <nameAlias wholeName="Acme Trading"/>
    <regulation><regulationSummary numberTitle="269/2014"/></regulation>
    <address><street>Main St 1</street><city>Moscow</city><country><code>RU</code></country></address>
  </sanctionEntity>
</export>"#;

    fn parse(xml: &str) -> Vec<CanonicalRecord> {
        EuCollector::new("http://localhost", None).parse(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_person_fields() {
        let records = parse(FRAGMENT);
        let kim = &records[0];
        assert_eq!(kim.id, "EU-100");
        assert_eq!(kim.name, "Kim Jong Un");
        assert_eq!(kim.entity_type, EntityType::Individual);
        assert_eq!(kim.country, "KP");
        assert_eq!(kim.details.nationalities, vec!["KP".to_string()]);
        assert_eq!(kim.details.aliases, vec!["Jong-un Kim".to_string()]);
        assert_eq!(kim.details.birth_date, "1984-01-08");
        assert_eq!(kim.details.addresses, vec!["Pyongyang, KP".to_string()]);
        assert_eq!(kim.programs, vec!["PRK".to_string()]);
        assert_eq!(kim.details.sanctions.len(), 1);
        assert_eq!(kim.details.sanctions[0].start_date, "2016-06-02");
        assert_eq!(kim.details.sanctions[0].reason, "Supreme Leader.");
        assert_eq!(kim.details.identifications[0].id_type, "National passport");
    }

    #[test]
    fn test_nameless_entity_is_skipped() {
        let records = parse(FRAGMENT);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.id != "EU-200"));
    }

    #[test]
    fn test_element_encoded_fields_and_unknown_type() {
        let records = parse(FRAGMENT);
        let acme = &records[1];
        assert_eq!(acme.entity_type, EntityType::Unknown);
        assert_eq!(acme.programs, vec!["269/2014".to_string()]);
        assert_eq!(acme.details.addresses, vec!["Main St 1, Moscow, RU".to_string()]);
    }

    #[test]
    fn test_same_result_without_namespace() {
        let plain = FRAGMENT.replace(r#" xmlns="http://eu.europa.ec/fpi/fsd/export""#, "");
        assert_eq!(parse(&plain), parse(FRAGMENT));
    }

    #[test]
    fn test_start_date_falls_back_to_publication_date() {
        let xml = r#"<export>
  <sanctionEntity logicalId="400">
    <subjectType classificationCode="E"/>
    <nameAlias wholeName="Orion Shipping"/>
    <regulation programme="SYR" publicationDate="2012-03-24"/>
  </sanctionEntity>
</export>"#;
        let records = parse(xml);
        assert_eq!(records[0].details.sanctions[0].program, "SYR");
        assert_eq!(records[0].details.sanctions[0].start_date, "2012-03-24");
    }
}
