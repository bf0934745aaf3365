//! Lenient deserializers for inventory fields that appear in more than one shape

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum CountOrList {
    Count(u32),
    List(Vec<IgnoredAny>),
    Absent(()),
}

/// Accept either a plain count or a list of records and yield the count.
///
/// Inventory records describe onboard ports both as `"sata_ports": 8` and as
/// a list of per-port objects.
pub(crate) fn count_or_list<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match CountOrList::deserialize(deserializer)? {
        CountOrList::Count(n) => n,
        CountOrList::List(items) => u32::try_from(items.len()).unwrap_or(u32::MAX),
        CountOrList::Absent(()) => 0,
    })
}

pub(crate) fn default_count() -> u32 {
    1
}
