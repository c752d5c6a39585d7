use super::Collector;
use crate::error::{ParseError, RecordError};
use crate::parser::fields::{assemble_address, coalesce_name, first_date, normalize_free_date};
use crate::parser::xml::{Node, XmlDocument};
use crate::types::{CanonicalRecord, EntityType, Identification, SanctionEntry, Source};
use tracing::{debug, info, warn};

const ADDRESS_FIELDS: [&str; 7] = [
    "address1",
    "address2",
    "address3",
    "city",
    "stateOrProvince",
    "postalCode",
    "country",
];

/// US Treasury OFAC Specially Designated Nationals list (`sdnList/sdnEntry`).
pub struct OfacCollector {
    url: String,
}

impl OfacCollector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn parse_entry(&self, node: Node<'_>) -> Result<CanonicalRecord, RecordError> {
        let uid = node.child_text("uid").ok_or(RecordError::MissingField("uid"))?;
        let entity_type = node
            .child_text("sdnType")
            .map(EntityType::classify)
            .unwrap_or(EntityType::Unknown);

        let first_name = node.child_text("firstName");
        let last_name = node.child_text("lastName");
        let name = match entity_type {
            EntityType::Individual => coalesce_name([first_name, last_name]),
            _ => coalesce_name([last_name]).or_else(|| coalesce_name([first_name])),
        }
        .ok_or_else(|| RecordError::MissingName(Source::Us.canonical_id(uid)))?;

        let mut record = CanonicalRecord::new(Source::Us, uid, name, entity_type);

        let reason = node.child_text("remarks").unwrap_or_default();
        for program in node.find_all("programList/program") {
            if let Some(program) = program.text() {
                if record.programs.iter().any(|p| p == program) {
                    continue;
                }
                record.add_program(program);
                record.details.sanctions.push(SanctionEntry {
                    program: program.to_string(),
                    start_date: String::new(),
                    reason: reason.to_string(),
                });
            }
        }

        for aka in node.find_all("akaList/aka") {
            if let Some(alias) = coalesce_name([aka.child_text("firstName"), aka.child_text("lastName")]) {
                record.add_alias(&alias);
            }
        }

        for address in node.find_all("addressList/address") {
            if let Some(address) = assemble_address(ADDRESS_FIELDS.iter().map(|f| address.child_text(f))) {
                record.add_address(address);
            }
        }

        for nationality in node.find_all("nationalityList/nationality") {
            if let Some(country) = nationality.child_text("country") {
                record.add_nationality(country);
            }
        }
        if record.details.nationalities.is_empty() {
            for citizenship in node.find_all("citizenshipList/citizenship") {
                if let Some(country) = citizenship.child_text("country") {
                    record.add_nationality(country);
                }
            }
        }
        record.country = record.details.nationalities.first().cloned().unwrap_or_default();

        for id in node.find_all("idList/id") {
            let (Some(id_type), Some(number)) = (id.child_text("idType"), id.child_text("idNumber")) else {
                continue;
            };
            record.add_identification(Identification {
                id_type: id_type.to_string(),
                number: number.to_string(),
                country: id.child_text("idCountry").unwrap_or_default().to_string(),
            });
        }

        record.details.birth_date = first_date(
            node.find_all("dateOfBirthList/dateOfBirthItem")
                .into_iter()
                .map(|item| item.child_text("dateOfBirth").map(normalize_free_date)),
        )
        .unwrap_or_default();

        Ok(record)
    }
}

impl Collector for OfacCollector {
    fn source(&self) -> Source {
        Source::Us
    }

    fn endpoints(&self) -> Vec<String> {
        vec![self.url.clone()]
    }

    fn parse(&self, raw: &[u8]) -> Result<Vec<CanonicalRecord>, ParseError> {
        debug!("OfacCollector: start bytes_len={}", raw.len());
        let doc = XmlDocument::parse(raw)?;
        let root = doc.root();

        if let Some(count) = root.child_text("publshInformation/Record_Count") {
            info!("OFAC publication reports {} records", count);
        }

        let mut records = Vec::new();
        let mut skipped = 0;
        for entry in root.descendants("sdnEntry") {
            match self.parse_entry(entry) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(source = "US", "Skipping record: {}", e);
                    skipped += 1;
                }
            }
        }

        info!("Parsed {} OFAC records ({} skipped)", records.len(), skipped);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = r#"<?xml version="1.0" standalone="yes"?>
<sdnList xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns="https://sanctionslistservice.ofac.treas.gov/api/PublicationPreview/exports/XML">
  <publshInformation>
    <Publish_Date>05/01/2024</Publish_Date>
    <Record_Count>3</Record_Count>
  </publshInformation>
  <sdnEntry>
    <uid>36</uid>
    <lastName>AEROCARIBBEAN AIRLINES</lastName>
    <sdnType>Entity</sdnType>
    <programList><program>CUBA</program></programList>
    <akaList><aka><uid>12</uid><type>a.k.a.</type><category>strong</category><lastName>AERO-CARIBBEAN</lastName></aka></akaList>
    <addressList><address><uid>25</uid><city>Havana</city><country>Cuba</country></address></addressList>
  </sdnEntry>
  <sdnEntry>
    <uid>7533</uid>
    <firstName>Jong Un</firstName>
    <lastName>KIM</lastName>
    <sdnType>Individual</sdnType>
    <remarks>Supreme Leader</remarks>
    <programList><program>DPRK2</program><program>DPRK3</program><program>DPRK2</program></programList>
    <idList><id><uid>1</uid><idType>Passport</idType><idNumber>836410001</idNumber><idCountry>Korea, North</idCountry></id></idList>
    <nationalityList><nationality><uid>2</uid><country>Korea, North</country></nationality></nationalityList>
    <dateOfBirthList><dateOfBirthItem><uid>3</uid><dateOfBirth>08 Jan 1984</dateOfBirth></dateOfBirthItem></dateOfBirthList>
  </sdnEntry>
  <sdnEntry>
    <uid>9999</uid>
    <sdnType>Vessel</sdnType>
  </sdnEntry>
</sdnList>"#;

    fn parse() -> Vec<CanonicalRecord> {
        OfacCollector::new("http://localhost").parse(FRAGMENT.as_bytes()).unwrap()
    }

    #[test]
    fn test_entity_uses_last_name() {
        let records = parse();
        let airline = &records[0];
        assert_eq!(airline.id, "OFAC-36");
        assert_eq!(airline.name, "AEROCARIBBEAN AIRLINES");
        assert_eq!(airline.entity_type, EntityType::Entity);
        assert_eq!(airline.source, "US-OFAC");
        assert_eq!(airline.details.aliases, vec!["AERO-CARIBBEAN".to_string()]);
        assert_eq!(airline.details.addresses, vec!["Havana, Cuba".to_string()]);
    }

    #[test]
    fn test_individual_fields() {
        let records = parse();
        let kim = &records[1];
        assert_eq!(kim.name, "Jong Un KIM");
        assert_eq!(kim.entity_type, EntityType::Individual);
        assert_eq!(kim.programs, vec!["DPRK2".to_string(), "DPRK3".to_string()]);
        assert_eq!(kim.details.sanctions.len(), 2);
        assert_eq!(kim.details.sanctions[0].reason, "Supreme Leader");
        assert_eq!(kim.country, "Korea, North");
        assert_eq!(kim.details.birth_date, "1984-01-08");
        assert_eq!(kim.details.identifications[0].number, "836410001");
    }

    #[test]
    fn test_nameless_entry_is_skipped() {
        assert_eq!(parse().len(), 2);
    }

    #[test]
    fn test_citizenship_used_when_no_nationality() {
        let xml = r#"<sdnList>
  <sdnEntry>
    <uid>15001</uid>
    <firstName>Ali</firstName>
    <lastName>HASSAN</lastName>
    <sdnType>Individual</sdnType>
    <citizenshipList>
      <citizenship><uid>4</uid><country>Iran</country></citizenship>
      <citizenship><uid>5</uid><country>Iraq</country></citizenship>
    </citizenshipList>
    <dateOfBirthList><dateOfBirthItem><uid>6</uid><dateOfBirth>Feb 1961</dateOfBirth></dateOfBirthItem></dateOfBirthList>
  </sdnEntry>
</sdnList>"#;
        let records = OfacCollector::new("http://localhost").parse(xml.as_bytes()).unwrap();
        let ali = &records[0];
        assert_eq!(ali.details.nationalities, vec!["Iran".to_string(), "Iraq".to_string()]);
        assert_eq!(ali.country, "Iran");
        assert_eq!(ali.details.birth_date, "1961-02");
    }
}
