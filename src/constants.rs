/// Default upstream endpoints for each authority.
pub const UN_SANCTIONS_URL: &str = "https://scsanctions.un.org/resources/xml/en/consolidated.xml";
pub const EU_SANCTIONS_URL: &str =
    "https://webgate.ec.europa.eu/fsd/fsf/public/files/xmlFullSanctionsList_1_1/content?token=dG9rZW4tMjAxNw";
pub const EU_SANCTIONS_ALT_URL: &str =
    "https://data.opensanctions.org/datasets/latest/eu_fsf/source.xml";
pub const US_SANCTIONS_URL: &str = "https://www.treasury.gov/ofac/downloads/sdn.xml";

// Fetcher defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_DOWNLOAD_CHUNK_BYTES: usize = 1024 * 1024;

// Writer defaults
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
pub const DEFAULT_BUFFER_THRESHOLD_BYTES: u64 = 256 * 1024 * 1024;

pub const DEFAULT_OUTPUT_DIR: &str = "docs/data";
pub const DEFAULT_TEMP_DIR: &str = "temp";
pub const DEFAULT_LOG_DIR: &str = "logs";

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";
pub const ACCEPT_XML: &str = "application/xml,text/xml,*/*";

// Output artifacts
pub const UNIFIED_FILE: &str = "sanctions.json";
pub const INTEGRATED_FILE: &str = "integrated_sanctions.json";
pub const DIAGNOSTIC_FILE: &str = "diagnostic_info.json";

/// Marker upstream lists use for an unknown date.
pub const PLACEHOLDER_DATE: &str = "0000-00-00";

/// Literal written into the diagnostic report when a count cannot be read.
pub const UNKNOWN_COUNT: &str = "unknown";
