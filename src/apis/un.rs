use super::Collector;
use crate::error::{ParseError, RecordError};
use crate::parser::fields::{assemble_address, assemble_date, coalesce_name, first_date};
use crate::parser::xml::{Node, XmlDocument};
use crate::types::{CanonicalRecord, EntityType, Identification, SanctionEntry, Source};
use tracing::{debug, info, warn};

const NAME_FIELDS: [&str; 4] = ["FIRST_NAME", "SECOND_NAME", "THIRD_NAME", "FOURTH_NAME"];
const ADDRESS_FIELDS: [&str; 5] = ["STREET", "CITY", "STATE_PROVINCE", "ZIP_CODE", "COUNTRY"];

/// UN Security Council consolidated list (`CONSOLIDATED_LIST`).
pub struct UnCollector {
    url: String,
}

impl UnCollector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn parse_individual(&self, node: Node<'_>) -> Result<CanonicalRecord, RecordError> {
        let data_id = node.child_text("DATAID").ok_or(RecordError::MissingField("DATAID"))?;
        let name = coalesce_name(NAME_FIELDS.iter().map(|f| node.child_text(f)))
            .ok_or_else(|| RecordError::MissingName(Source::Un.canonical_id(data_id)))?;

        let mut record = CanonicalRecord::new(Source::Un, data_id, name, EntityType::Individual);
        self.extract_common(&mut record, node, "INDIVIDUAL_ADDRESS");

        for value in node.find_all("NATIONALITY/VALUE") {
            if let Some(nationality) = value.text() {
                record.add_nationality(nationality);
            }
        }
        record.country = record.details.nationalities.first().cloned().unwrap_or_default();

        let structured = node.children("INDIVIDUAL_DATE_OF_BIRTH").into_iter().map(|dob| {
            assemble_date(
                dob.child_text("DATE"),
                dob.child_text("YEAR").or_else(|| dob.child_text("FROM_YEAR")),
                None,
                None,
            )
        });
        let plain = node.child_text("DATE_OF_BIRTH").map(str::to_string);
        record.details.birth_date = first_date(structured.chain(std::iter::once(plain))).unwrap_or_default();

        for document in node.children("INDIVIDUAL_DOCUMENT") {
            let (Some(doc_type), Some(number)) = (
                document.child_text("TYPE_OF_DOCUMENT"),
                document.child_text("NUMBER"),
            ) else {
                continue;
            };
            let country = document
                .child_text("ISSUING_COUNTRY")
                .or_else(|| document.child_text("COUNTRY_OF_ISSUE"))
                .unwrap_or_default();
            record.add_identification(Identification {
                id_type: doc_type.to_string(),
                number: number.to_string(),
                country: country.to_string(),
            });
        }

        Ok(record)
    }

    fn parse_entity(&self, node: Node<'_>) -> Result<CanonicalRecord, RecordError> {
        let data_id = node.child_text("DATAID").ok_or(RecordError::MissingField("DATAID"))?;
        let name = coalesce_name([node.child_text("FIRST_NAME")])
            .ok_or_else(|| RecordError::MissingName(Source::Un.canonical_id(data_id)))?;

        let mut record = CanonicalRecord::new(Source::Un, data_id, name, EntityType::Entity);
        self.extract_common(&mut record, node, "ENTITY_ADDRESS");

        if let Some(country) = node.descendant_text("COUNTRY") {
            record.country = country.to_string();
            record.add_nationality(country);
        }

        Ok(record)
    }

    /// Fields shared by individuals and entities: list type, aliases, addresses.
    fn extract_common(&self, record: &mut CanonicalRecord, node: Node<'_>, address_tag: &str) {
        let list_type = node.child_text("UN_LIST_TYPE");
        if let Some(program) = list_type {
            record.add_program(program);
            record.details.sanctions.push(SanctionEntry {
                program: program.to_string(),
                start_date: node.child_text("LISTED_ON").unwrap_or_default().to_string(),
                reason: node.child_text("COMMENTS1").unwrap_or_default().to_string(),
            });
        }

        for alias in node.descendants("ALIAS_NAME") {
            if let Some(alias) = alias.text() {
                record.add_alias(alias);
            }
        }

        let blocks = node
            .children(address_tag)
            .into_iter()
            .chain(node.children("ADDRESS"));
        for block in blocks {
            if let Some(address) = assemble_address(ADDRESS_FIELDS.iter().map(|f| block.child_text(f))) {
                record.add_address(address);
            }
        }
    }

    fn collect_records<F>(&self, root: Node<'_>, tag: &str, parse: F, out: &mut Vec<CanonicalRecord>) -> usize
    where
        F: Fn(Node<'_>) -> Result<CanonicalRecord, RecordError>,
    {
        let mut skipped = 0;
        for node in root.descendants(tag) {
            match parse(node) {
                Ok(record) => out.push(record),
                Err(e) => {
                    warn!(source = "UN", kind = tag, "Skipping record: {}", e);
                    skipped += 1;
                }
            }
        }
        skipped
    }
}

impl Collector for UnCollector {
    fn source(&self) -> Source {
        Source::Un
    }

    fn endpoints(&self) -> Vec<String> {
        vec![self.url.clone()]
    }

    fn parse(&self, raw: &[u8]) -> Result<Vec<CanonicalRecord>, ParseError> {
        debug!("UnCollector: start bytes_len={}", raw.len());
        let doc = XmlDocument::parse(raw)?;
        if let Err(e) = doc.expect_root("CONSOLIDATED_LIST") {
            warn!("UN payload: {}", e);
        }

        let root = doc.root();
        let mut records = Vec::new();
        let mut skipped = self.collect_records(root, "INDIVIDUAL", |n| self.parse_individual(n), &mut records);
        skipped += self.collect_records(root, "ENTITY", |n| self.parse_entity(n), &mut records);

        info!("Parsed {} UN records ({} skipped)", records.len(), skipped);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<CONSOLIDATED_LIST dateGenerated="2024-05-01T00:00:00Z">
  <INDIVIDUALS>
    <INDIVIDUAL>
      <DATAID>6908555</DATAID>
      <FIRST_NAME>KIM</FIRST_NAME>
      <SECOND_NAME>JONG</SECOND_NAME>
      <THIRD_NAME>UN</THIRD_NAME>
      <UN_LIST_TYPE>DPRK</UN_LIST_TYPE>
      <LISTED_ON>2017-06-02</LISTED_ON>
      <NATIONALITY><VALUE>KP</VALUE></NATIONALITY>
      <INDIVIDUAL_ALIAS><QUALITY>Good</QUALITY><ALIAS_NAME>Kim Jong-un</ALIAS_NAME></INDIVIDUAL_ALIAS>
      <INDIVIDUAL_ALIAS><ALIAS_NAME>KIM JONG UN</ALIAS_NAME></INDIVIDUAL_ALIAS>
      <INDIVIDUAL_ADDRESS><CITY>Pyongyang</CITY><COUNTRY>DPRK</COUNTRY></INDIVIDUAL_ADDRESS>
      <INDIVIDUAL_ADDRESS><NOTE>unknown</NOTE></INDIVIDUAL_ADDRESS>
      <INDIVIDUAL_DATE_OF_BIRTH><TYPE_OF_DATE>EXACT</TYPE_OF_DATE><DATE>1984-01-08</DATE></INDIVIDUAL_DATE_OF_BIRTH>
      <INDIVIDUAL_DOCUMENT><TYPE_OF_DOCUMENT>Passport</TYPE_OF_DOCUMENT><NUMBER>836410001</NUMBER><ISSUING_COUNTRY>KP</ISSUING_COUNTRY></INDIVIDUAL_DOCUMENT>
      <INDIVIDUAL_DOCUMENT><TYPE_OF_DOCUMENT>National ID</TYPE_OF_DOCUMENT></INDIVIDUAL_DOCUMENT>
    </INDIVIDUAL>
    <INDIVIDUAL>
      <DATAID>111</DATAID>
      <UN_LIST_TYPE>DPRK</UN_LIST_TYPE>
    </INDIVIDUAL>
    <INDIVIDUAL>
      <FIRST_NAME>NO ID</FIRST_NAME>
    </INDIVIDUAL>
  </INDIVIDUALS>
  <ENTITIES>
    <ENTITY>
      <DATAID>110432</DATAID>
      <FIRST_NAME>KOREA MINING DEVELOPMENT TRADING CORPORATION</FIRST_NAME>
      <UN_LIST_TYPE>DPRK</UN_LIST_TYPE>
      <LISTED_ON>2009-04-24</LISTED_ON>
      <COMMENTS1>Primary arms dealer.</COMMENTS1>
      <ENTITY_ALIAS><ALIAS_NAME>KOMID</ALIAS_NAME></ENTITY_ALIAS>
      <ENTITY_ADDRESS><STREET>Central District</STREET><CITY>Pyongyang</CITY><COUNTRY>DPRK</COUNTRY></ENTITY_ADDRESS>
    </ENTITY>
  </ENTITIES>
</CONSOLIDATED_LIST>"#;

    fn parse() -> Vec<CanonicalRecord> {
        UnCollector::new("http://localhost").parse(FRAGMENT.as_bytes()).unwrap()
    }

    #[test]
    fn test_individual_fields() {
        let records = parse();
        let kim = records.iter().find(|r| r.id == "UN-6908555").unwrap();
        assert_eq!(kim.name, "KIM JONG UN");
        assert_eq!(kim.entity_type, EntityType::Individual);
        assert_eq!(kim.country, "KP");
        assert_eq!(kim.programs, vec!["DPRK".to_string()]);
        assert_eq!(kim.source, "UN");
        // The alias equal to the primary name is folded away.
        assert_eq!(kim.details.aliases, vec!["Kim Jong-un".to_string()]);
        assert_eq!(kim.details.addresses, vec!["Pyongyang, DPRK".to_string()]);
        assert_eq!(kim.details.birth_date, "1984-01-08");
        assert_eq!(kim.details.identifications.len(), 1);
        assert_eq!(kim.details.identifications[0].country, "KP");
        assert_eq!(kim.details.sanctions[0].start_date, "2017-06-02");
    }

    #[test]
    fn test_records_without_name_or_id_are_skipped() {
        let records = parse();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.id != "UN-111"));
    }

    #[test]
    fn test_entity_fields() {
        let records = parse();
        let komid = records.iter().find(|r| r.id == "UN-110432").unwrap();
        assert_eq!(komid.entity_type, EntityType::Entity);
        assert_eq!(komid.country, "DPRK");
        assert_eq!(komid.details.aliases, vec!["KOMID".to_string()]);
        assert_eq!(
            komid.details.addresses,
            vec!["Central District, Pyongyang, DPRK".to_string()]
        );
        assert_eq!(komid.details.sanctions[0].reason, "Primary arms dealer.");
        assert!(komid.details.birth_date.is_empty());
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let collector = UnCollector::new("http://localhost");
        assert!(collector.parse(b"<CONSOLIDATED_LIST><INDIVIDUALS>").is_err());
    }

    #[test]
    fn test_birth_date_fallbacks() {
        let xml = r#"<CONSOLIDATED_LIST>
  <INDIVIDUALS>
    <INDIVIDUAL>
      <DATAID>1</DATAID>
      <FIRST_NAME>RANGE</FIRST_NAME>
      <INDIVIDUAL_DATE_OF_BIRTH><TYPE_OF_DATE>BETWEEN</TYPE_OF_DATE><FROM_YEAR>1960</FROM_YEAR><TO_YEAR>1962</TO_YEAR></INDIVIDUAL_DATE_OF_BIRTH>
    </INDIVIDUAL>
    <INDIVIDUAL>
      <DATAID>2</DATAID>
      <FIRST_NAME>PLAIN</FIRST_NAME>
      <INDIVIDUAL_DATE_OF_BIRTH><DATE>0000-00-00</DATE></INDIVIDUAL_DATE_OF_BIRTH>
      <DATE_OF_BIRTH>1975-05-20</DATE_OF_BIRTH>
    </INDIVIDUAL>
  </INDIVIDUALS>
</CONSOLIDATED_LIST>"#;
        let records = UnCollector::new("http://localhost").parse(xml.as_bytes()).unwrap();
        assert_eq!(records[0].details.birth_date, "1960");
        assert_eq!(records[1].details.birth_date, "1975-05-20");
    }
}
