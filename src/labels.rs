//! Subject labels (clinical dementia rating) read from a demographics sheet.

use csv::{ReaderBuilder, Trim};

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::iter::FromIterator;
use std::path::Path;

use crate::error::{Result, SlicerError};

pub const DEFAULT_ID_COLUMN: &str = "ID";
pub const DEFAULT_LABEL_COLUMN: &str = "CDR";

/// The class a subject belongs to, e.g. a CDR score like "0.5".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(String);

impl Label {
    pub fn new<S: Into<String>>(value: S) -> Label {
        Label(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the output directory collecting the slices with this label.
    pub fn dir_name(&self) -> String {
        format!("CDR_{}", self.0)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How label values from the sheet are turned into classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMode {
    /// Use the value as found in the sheet.
    Raw,
    /// Healthy ("0") versus any impairment ("1").
    Binary,
}

impl Default for LabelMode {
    fn default() -> LabelMode {
        LabelMode::Raw
    }
}

impl LabelMode {
    /// Turn a sheet value into a label. Raw values end up in a directory name, so path separators are rejected.
    pub fn apply(&self, value: &str) -> Result<Label> {
        match self {
            LabelMode::Raw => {
                if value.contains(|c| c == '/' || c == '\\' || c == '\0') {
                    return Err(SlicerError::InvalidLabel(value.to_string()));
                }
                Ok(Label::new(value))
            }
            LabelMode::Binary => {
                let score: f64 = value
                    .parse()
                    .map_err(|_| SlicerError::InvalidLabel(value.to_string()))?;
                if score.is_nan() {
                    return Err(SlicerError::InvalidLabel(value.to_string()));
                }
                Ok(Label::new(if score > 0.0 { "1" } else { "0" }))
            }
        }
    }
}

/// Names of the subject id and label columns of the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelColumns {
    pub id: String,
    pub label: String,
}

impl Default for LabelColumns {
    fn default() -> LabelColumns {
        LabelColumns {
            id: String::from(DEFAULT_ID_COLUMN),
            label: String::from(DEFAULT_LABEL_COLUMN),
        }
    }
}

/// Maps subject ids (the names of the subject directories) to their label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap {
    labels: HashMap<String, Label>,
}

impl LabelMap {
    pub fn new() -> LabelMap {
        LabelMap::default()
    }

    /// Read a label map from a CSV file with a header row.
    pub fn from_csv<P: AsRef<Path>>(path: P, columns: &LabelColumns, mode: LabelMode) -> Result<LabelMap> {
        let file = BufReader::new(File::open(path)?);
        LabelMap::from_reader(file, columns, mode)
    }

    /// Read a label map from CSV data with a header row. Rows with an empty id or label are skipped.
    pub fn from_reader<R: Read>(input: R, columns: &LabelColumns, mode: LabelMode) -> Result<LabelMap> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(input);

        let headers = rdr.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| SlicerError::MissingLabelColumn(name.to_string()))
        };
        let id_idx = column(&columns.id)?;
        let label_idx = column(&columns.label)?;

        let mut map = LabelMap::new();
        for result in rdr.records() {
            let record = result?;
            let id = record.get(id_idx).unwrap_or("");
            let value = record.get(label_idx).unwrap_or("");
            if id.is_empty() || value.is_empty() {
                continue;
            }
            map.insert(id, mode.apply(value)?);
        }
        Ok(map)
    }

    pub fn insert<S: Into<String>>(&mut self, subject_id: S, label: Label) -> Option<Label> {
        self.labels.insert(subject_id.into(), label)
    }

    pub fn get(&self, subject_id: &str) -> Option<&Label> {
        self.labels.get(subject_id)
    }

    pub fn contains(&self, subject_id: &str) -> bool {
        self.labels.contains_key(subject_id)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<(String, Label)> for LabelMap {
    fn from_iter<I: IntoIterator<Item = (String, Label)>>(iter: I) -> LabelMap {
        LabelMap {
            labels: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SHEET: &str = "ID,M/F,Hand,Age,Educ,SES,MMSE,CDR,eTIV,nWBV,ASF,Delay
OAS1_0001_MR1,F,R,74,2,3,29,0,1344,0.743,1.306,N/A
OAS1_0002_MR1,F,R,55,4,1,29,0,1147,0.81,1.531,N/A
OAS1_0003_MR1,F,R,73,4,3,27,0.5,1454,0.708,1.207,N/A
OAS1_0004_MR1,M,R,28,,,,,1588,0.803,1.105,N/A
OAS1_0028_MR1,F,R,86,2,4,27, 1 ,1449,0.738,1.211,N/A
";

    #[test]
    fn sheet_rows_without_label_are_skipped() {
        let map = LabelMap::from_reader(SHEET.as_bytes(), &LabelColumns::default(), LabelMode::Raw).unwrap();
        assert_eq!(4, map.len());
        assert_eq!(Some(&Label::new("0.5")), map.get("OAS1_0003_MR1"));
        assert_eq!(Some(&Label::new("1")), map.get("OAS1_0028_MR1"));
        assert!(!map.contains("OAS1_0004_MR1"));
    }

    #[test]
    fn binary_mode_splits_healthy_from_impaired() {
        let map = LabelMap::from_reader(SHEET.as_bytes(), &LabelColumns::default(), LabelMode::Binary).unwrap();
        assert_eq!("0", map.get("OAS1_0001_MR1").unwrap().as_str());
        assert_eq!("1", map.get("OAS1_0003_MR1").unwrap().as_str());
        assert_eq!("CDR_1", map.get("OAS1_0028_MR1").unwrap().dir_name());
    }

    #[test]
    fn binary_mode_rejects_non_numeric_labels() {
        let sheet = "ID,CDR\nOAS1_0001_MR1,mild\n";
        let res = LabelMap::from_reader(sheet.as_bytes(), &LabelColumns::default(), LabelMode::Binary);
        assert!(matches!(res, Err(SlicerError::InvalidLabel(_))));
    }

    #[test]
    fn raw_labels_with_path_separators_are_rejected() {
        for value in ["../0.5", "0/5", "0\\5", "0\05"].iter() {
            match LabelMode::Raw.apply(value) {
                Err(SlicerError::InvalidLabel(v)) => assert_eq!(*value, v),
                other => panic!("expected InvalidLabel for {:?}, got {:?}", value, other),
            }
        }
        assert_eq!(Label::new("0.5"), LabelMode::Raw.apply("0.5").unwrap());

        let sheet = "ID,CDR\nOAS1_0001_MR1,../../etc\n";
        let res = LabelMap::from_reader(sheet.as_bytes(), &LabelColumns::default(), LabelMode::Raw);
        assert!(matches!(res, Err(SlicerError::InvalidLabel(_))));
    }

    #[test]
    fn missing_column_is_reported() {
        let columns = LabelColumns {
            id: String::from("Subject"),
            label: String::from("CDR"),
        };
        match LabelMap::from_reader(SHEET.as_bytes(), &columns, LabelMode::Raw) {
            Err(SlicerError::MissingLabelColumn(name)) => assert_eq!("Subject", name),
            other => panic!("expected MissingLabelColumn, got {:?}", other),
        }
    }

    #[test]
    fn label_maps_can_be_collected() {
        let map: LabelMap = vec![(String::from("a"), Label::new("2"))].into_iter().collect();
        assert_eq!("CDR_2", map.get("a").unwrap().dir_name());
        assert_eq!("2", map.get("a").unwrap().to_string());
    }
}
