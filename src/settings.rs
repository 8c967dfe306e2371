//! Environment-driven defaults for the command line.
//!
//! `WIKI_INGEST_LANGUAGE`, `WIKI_INGEST_THREADS` and `WIKI_INGEST_NAMESPACES`
//! (comma separated codes) are read after loading a `.env` file if present.

use std::collections::HashMap;
use std::fmt;

use config::{Config, ConfigError, Environment};
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use thiserror::Error;

use crate::language::{Language, LanguageError};
use crate::source::SourceOptions;
use crate::title::namespace_filter;

const PREFIX: &str = "WIKI_INGEST";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid settings: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Language(#[from] LanguageError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IngestSettings {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default, deserialize_with = "namespace_list")]
    pub namespaces: Option<Vec<i32>>,
}

impl IngestSettings {
    pub fn load() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        Self::from_vars(None)
    }

    /// Read from `vars` instead of the process environment when given.
    /// Keys are full variable names (`WIKI_INGEST_THREADS`).
    pub fn from_vars(vars: Option<HashMap<String, String>>) -> Result<Self, SettingsError> {
        let env = Environment::with_prefix(PREFIX)
            .try_parsing(true)
            .ignore_empty(true)
            .list_separator(",")
            .with_list_parse_key("namespaces")
            .source(vars);
        let settings = Config::builder().add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }

    pub fn to_options(&self) -> Result<SourceOptions, SettingsError> {
        let mut options = SourceOptions::default();
        if let Some(code) = &self.language {
            options = options.with_language(Language::new(code)?);
        }
        if let Some(threads) = self.threads {
            options = options.with_threads(threads);
        }
        if let Some(ns) = &self.namespaces {
            options = options.with_filter(namespace_filter(ns));
        }
        Ok(options)
    }
}

/// A single code parses as a number, several as a list.
fn namespace_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<i32>>, D::Error> {
    struct Codes;

    impl<'de> Visitor<'de> for Codes {
        type Value = Vec<i32>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a namespace code or a comma separated list of codes")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            i32::try_from(v).map(|n| vec![n]).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            i32::try_from(v).map(|n| vec![n]).map_err(E::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse().map_err(|_| E::invalid_value(de::Unexpected::Str(s), &self)))
                .collect()
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut codes = Vec::new();
            while let Some(code) = seq.next_element::<i32>()? {
                codes.push(code);
            }
            Ok(codes)
        }
    }

    deserializer.deserialize_any(Codes).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let settings = IngestSettings::from_vars(vars(&[])).unwrap();
        assert_eq!(settings, IngestSettings::default());
        let options = settings.to_options().unwrap();
        assert!(options.language.is_none());
        assert!(options.threads.is_none());
    }

    #[test]
    fn reads_prefixed_keys() {
        let settings = IngestSettings::from_vars(vars(&[
            ("WIKI_INGEST_LANGUAGE", "de"),
            ("WIKI_INGEST_THREADS", "4"),
            ("WIKI_INGEST_NAMESPACES", "0,14"),
            ("LANGUAGE", "fr"),
        ]))
        .unwrap();
        assert_eq!(settings.language.as_deref(), Some("de"));
        assert_eq!(settings.threads, Some(4));
        assert_eq!(settings.namespaces, Some(vec![0, 14]));

        let options = settings.to_options().unwrap();
        assert_eq!(options.language.map(|l| l.code().to_string()).as_deref(), Some("de"));
        assert_eq!(options.threads, Some(4));
    }

    #[test]
    fn single_namespace_is_a_list_of_one() {
        let settings = IngestSettings::from_vars(vars(&[("WIKI_INGEST_NAMESPACES", "14")])).unwrap();
        assert_eq!(settings.namespaces, Some(vec![14]));
    }

    #[test]
    fn empty_values_are_ignored() {
        let settings = IngestSettings::from_vars(vars(&[("WIKI_INGEST_LANGUAGE", "")])).unwrap();
        assert_eq!(settings.language, None);
    }

    #[test]
    fn rejects_bad_values() {
        let err = IngestSettings::from_vars(vars(&[("WIKI_INGEST_THREADS", "many")])).unwrap_err();
        assert!(matches!(err, SettingsError::Config(_)));

        assert!(IngestSettings::from_vars(vars(&[("WIKI_INGEST_NAMESPACES", "0,x")])).is_err());

        let settings = IngestSettings::from_vars(vars(&[("WIKI_INGEST_LANGUAGE", "Not Valid")])).unwrap();
        assert!(matches!(settings.to_options(), Err(SettingsError::Language(_))));
    }
}
