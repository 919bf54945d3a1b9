use anyhow::{Context, Result};
use chrono_tz::Tz;

use super::keywords::NormalizedMessage;
use crate::config::CityConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct City {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: Tz,
    aliases: Vec<String>,
}

impl City {
    pub fn new(
        name: impl Into<String>,
        aliases: &[&str],
        latitude: f64,
        longitude: f64,
        timezone: Tz,
    ) -> Self {
        let name = name.into();
        let mut all: Vec<String> = aliases.iter().map(|a| a.to_lowercase()).collect();
        let lowered = name.to_lowercase();
        if !all.contains(&lowered) {
            all.push(lowered);
        }
        Self {
            name,
            latitude,
            longitude,
            timezone,
            aliases: all,
        }
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    fn is_named(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.aliases.iter().any(|a| *a == name)
    }
}

/// The cities the router recognizes, with their aliases in every supported language.
#[derive(Debug, Clone)]
pub struct CityDirectory {
    cities: Vec<City>,
}

impl Default for CityDirectory {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CityDirectory {
    pub fn builtin() -> Self {
        Self {
            cities: vec![
                City::new(
                    "Bangkok",
                    &["กรุงเทพ", "กรุงเทพฯ", "bangkok", "バンコク"],
                    13.7563,
                    100.5018,
                    chrono_tz::Asia::Bangkok,
                ),
                City::new(
                    "Tokyo",
                    &["โตเกียว", "tokyo", "東京"],
                    35.6762,
                    139.6503,
                    chrono_tz::Asia::Tokyo,
                ),
                City::new(
                    "Sapporo",
                    &["ซัปโปโร", "sapporo", "札幌"],
                    43.0642,
                    141.3469,
                    chrono_tz::Asia::Tokyo,
                ),
                City::new(
                    "Otaru",
                    &["โอตารุ", "otaru", "小樽"],
                    43.1907,
                    140.9947,
                    chrono_tz::Asia::Tokyo,
                ),
                City::new(
                    "Utsunomiya",
                    &["อุสึโนะมิยะ", "utsunomiya", "宇都宮"],
                    36.5583,
                    139.8694,
                    chrono_tz::Asia::Tokyo,
                ),
            ],
        }
    }

    /// Built-in cities plus the configured extras. Extras with a known name replace the built-in entry.
    pub fn with_extra(extra: &[CityConfig]) -> Result<Self> {
        let mut directory = Self::builtin();
        for entry in extra {
            let timezone: Tz = entry
                .timezone
                .parse()
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("unknown timezone for {}", entry.name))?;
            let aliases: Vec<&str> = entry.aliases.iter().map(String::as_str).collect();
            let city = City::new(
                entry.name.clone(),
                &aliases,
                entry.latitude,
                entry.longitude,
                timezone,
            );
            directory.cities.retain(|c| !c.is_named(&entry.name));
            directory.cities.push(city);
        }
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &City> {
        self.cities.iter()
    }

    /// Exact lookup by canonical name or alias, case-insensitive.
    pub fn by_name(&self, name: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.is_named(name))
    }

    /// First city whose name or alias appears in the message.
    pub fn find_in(&self, message: &NormalizedMessage) -> Option<&City> {
        self.cities
            .iter()
            .find(|c| c.aliases.iter().any(|a| message.mentions(a)))
    }
}
