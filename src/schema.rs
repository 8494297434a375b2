//! Declarative column schema: YAML persistence, typed accessors, and the
//! spreadsheet-position vocabulary.
//!
//! A [`Schema`] is the ordered list of [`ColumnSpec`] descriptors covering
//! every column of the source sheet, in sheet order. The required subset,
//! once renamed, IS the canonical column contract: the projector slices by
//! the required positions and the validators check against the required
//! kinds. The registry is loaded once and is read-only thereafter, safe to
//! share across pipeline runs.

use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow, ensure};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::LedgerError;

/// The value contract of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    String,
    /// Monetary column; `can_be_negative = false` means the sign policy is
    /// must-be-nonnegative.
    Numeric { can_be_negative: bool },
    /// Date column with a fixed day/month/year chrono format.
    Date { format: String },
}

impl ColumnKind {
    pub fn signature_token(&self) -> String {
        match self {
            ColumnKind::String => "string".to_string(),
            ColumnKind::Numeric {
                can_be_negative: false,
            } => "numeric".to_string(),
            ColumnKind::Numeric {
                can_be_negative: true,
            } => "numeric(signed)".to_string(),
            ColumnKind::Date { format } => format!("date({format})"),
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature_token())
    }
}

impl FromStr for ColumnKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "string" => return Ok(ColumnKind::String),
            "numeric" | "float" => {
                return Ok(ColumnKind::Numeric {
                    can_be_negative: false,
                });
            }
            "numeric(signed)" | "float(signed)" => {
                return Ok(ColumnKind::Numeric {
                    can_be_negative: true,
                });
            }
            _ => {}
        }
        if let Some(inner) = trimmed
            .strip_prefix("date(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            ensure!(!inner.is_empty(), "date() requires a format, e.g. date(%d/%m/%Y)");
            return Ok(ColumnKind::Date {
                format: inner.to_string(),
            });
        }
        Err(anyhow!(
            "Unknown column datatype '{value}'. Supported: string, numeric, numeric(signed), date(FORMAT)"
        ))
    }
}

impl Serialize for ColumnKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.signature_token())
    }
}

impl<'de> Deserialize<'de> for ColumnKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        ColumnKind::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

/// One column descriptor: where it lives in the sheet, what it is called
/// after projection, and what contract its values must honour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Raw header label as it appears in the export's header row.
    pub source: String,
    /// Spreadsheet column letter (documentation and column-restricted reads).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Canonical name after projection.
    pub rename: String,
    pub datatype: ColumnKind,
    #[serde(default)]
    pub required: bool,
}

/// Column-group expansion rule: when a raw header matches `pattern`, the
/// following `span` sibling columns are renamed with a suffix derived from
/// the pattern's first capture group instead of colliding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRule {
    pub pattern: String,
    pub span: usize,
}

impl GroupRule {
    pub fn compile(&self) -> Result<Regex> {
        let regex = Regex::new(&self.pattern)
            .with_context(|| format!("Compiling group expansion pattern '{}'", self.pattern))?;
        ensure!(
            regex.captures_len() >= 2,
            "Group expansion pattern '{}' needs one capture group for the suffix variable",
            self.pattern
        );
        ensure!(self.span > 0, "Group expansion span must be positive");
        Ok(regex)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_expansions: Vec<GroupRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
}

impl Schema {
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let load = || -> Result<Schema> {
            let file =
                File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
            let reader = BufReader::new(file);
            let schema: Schema =
                serde_yaml::from_reader(reader).context("Parsing schema YAML")?;
            schema.ensure_valid()?;
            Ok(schema)
        };
        load().map_err(|err| LedgerError::SchemaLoad {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }

    fn ensure_valid(&self) -> Result<()> {
        ensure!(!self.columns.is_empty(), "Schema defines no columns");
        for spec in &self.columns {
            ensure!(
                !spec.rename.trim().is_empty(),
                "Column with source '{}' is missing a rename",
                spec.source
            );
            if let Some(letter) = &spec.column {
                column_letter_to_index(letter).with_context(|| {
                    format!("Column '{}' has an invalid column letter", spec.rename)
                })?;
            }
            if let ColumnKind::Date { format } = &spec.datatype {
                ensure!(
                    !format.trim().is_empty(),
                    "Date column '{}' is missing a format",
                    spec.rename
                );
            }
        }
        for rule in &self.group_expansions {
            rule.compile()?;
        }
        Ok(())
    }

    fn required(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|spec| spec.required)
    }

    /// Raw header labels for the full sheet, in sheet order.
    pub fn source_headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.source.clone()).collect()
    }

    /// 0-based positions of the required columns within the sheet.
    pub fn required_positions(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.required)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Canonical (renamed) names of the required columns, in order.
    pub fn canonical_names(&self) -> Vec<String> {
        self.required().map(|c| c.rename.clone()).collect()
    }

    /// Required specs in order; aligned 1:1 with the projected frame.
    pub fn required_specs(&self) -> Vec<&ColumnSpec> {
        self.required().collect()
    }

    pub fn required_kinds(&self) -> Vec<ColumnKind> {
        self.required().map(|c| c.datatype.clone()).collect()
    }

    pub fn numeric_columns(&self) -> Vec<(String, bool)> {
        self.required()
            .filter_map(|c| match &c.datatype {
                ColumnKind::Numeric { can_be_negative } => {
                    Some((c.rename.clone(), *can_be_negative))
                }
                _ => None,
            })
            .collect()
    }

    pub fn date_columns(&self) -> Vec<(String, String)> {
        self.required()
            .filter_map(|c| match &c.datatype {
                ColumnKind::Date { format } => Some((c.rename.clone(), format.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn string_columns(&self) -> Vec<String> {
        self.required()
            .filter(|c| c.datatype == ColumnKind::String)
            .map(|c| c.rename.clone())
            .collect()
    }
}

/// Converts a spreadsheet column letter ("A", "B", …, "AA", "AL") to its
/// 0-based index.
pub fn column_letter_to_index(letter: &str) -> Result<usize> {
    let trimmed = letter.trim();
    ensure!(!trimmed.is_empty(), "Column letter cannot be empty");
    let mut index = 0usize;
    for ch in trimmed.chars() {
        ensure!(
            ch.is_ascii_alphabetic(),
            "Column letter '{letter}' contains a non-letter character"
        );
        index = index * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Ok(index - 1)
}

/// Applies pandas-style duplicate suffixing: the first occurrence keeps its
/// name, later ones become `name.1`, `name.2`, … in order of duplication.
pub fn disambiguate(names: &[String]) -> Vec<String> {
    let mut seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    names
        .iter()
        .map(|name| {
            let count = seen.entry(name.as_str()).or_insert(0);
            *count += 1;
            if *count > 1 {
                format!("{name}.{}", *count - 1)
            } else {
                name.clone()
            }
        })
        .collect()
}
