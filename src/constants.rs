//! Shared constants: id and sort-key alphabets, engine defaults and the
//! placeholder text of sentinel tree nodes.

/// Alphabet of generated base62 identifiers (0-9, a-z, A-Z)
pub const BASE62_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Digit alphabet for fractional sort keys.
///
/// Same 62 symbols as [`BASE62_CHARS`] but in ASCII order, so that plain
/// byte-wise string comparison agrees with digit-value comparison.
pub const SORT_KEY_DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Sort key used for the first child of an empty sibling list ('V', digit 31 of 62)
pub const FIRST_SORT_KEY: &str = "V";

/// Length of generated base62 block and document IDs
pub const ID16_LENGTH: usize = 16;

/// Default number of commits between automatic snapshots
///
/// Bounds replay cost: resolving any version never replays more than
/// this many revisions on top of the nearest snapshot.
pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 50;

/// Default number of revisions returned by revision listings
pub const DEFAULT_REVISION_LIST_LIMIT: usize = 100;

/// Commit message used for the document initialization revision
pub const INIT_COMMIT_MESSAGE: &str = "init";

/// Block type tag of every document's root block
pub const ROOT_BLOCK_TYPE: &str = "page";

/// Default configuration file name looked up by `Config::load`
pub const DEFAULT_CONFIG_FILE: &str = "blockdoc.toml";

/// Default data directory for the file store
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Placeholder text carried by cycle sentinel nodes
pub const CYCLE_PLACEHOLDER: &str = "[cycle detected]";

/// Placeholder text carried by missing-version sentinel nodes
pub const MISSING_PLACEHOLDER: &str = "[missing block version]";
