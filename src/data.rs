use crate::error::SemoosError;
use log::{info, warn};
use ndarray::{Array2, Axis};
use std::fmt;

pub const MAJORITY_CLASS: u8 = 0;
pub const MINORITY_CLASS: u8 = 1;

#[derive(Clone, PartialEq)]
pub struct Data {
    pub X: Array2<f64>,          // Matrix for feature values (samples in rows)
    pub y: Vec<u8>,              // Vector for target values (0 majority, 1 minority)
    pub features: Vec<String>,   // Feature names (from the CSV header)
    pub samples: Vec<String>,
    pub feature_len: usize,
    pub sample_len: usize,
    pub classes: Vec<String>,
}

impl Data {
    /// Build a dataset from a dense matrix and binary labels
    pub fn new(X: Array2<f64>, y: Vec<u8>) -> Result<Data, SemoosError> {
        let (sample_len, feature_len) = X.dim();
        if y.len() != sample_len {
            return Err(SemoosError::Data(format!(
                "X has {} samples but y has {} labels",
                sample_len,
                y.len()
            )));
        }
        if let Some(label) = y.iter().find(|&&l| l != MAJORITY_CLASS && l != MINORITY_CLASS) {
            return Err(SemoosError::Data(format!(
                "label {} is not binary: expected {} (majority) or {} (minority)",
                label, MAJORITY_CLASS, MINORITY_CLASS
            )));
        }

        Ok(Data {
            X,
            y,
            features: (0..feature_len).map(|j| format!("feature_{}", j)).collect(),
            samples: (0..sample_len).map(|i| format!("sample_{}", i)).collect(),
            feature_len,
            sample_len,
            classes: Vec::new(),
        })
    }

    /// Load a CSV file with a header row, the label in the last column and optionally
    /// the sample name in the first one.
    pub fn load_data(path: &str, delimiter: char, sample_column: bool) -> Result<Data, SemoosError> {
        info!("Loading file {}...", path);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let skip = if sample_column { 1 } else { 0 };
        if headers.len() < skip + 2 {
            return Err(SemoosError::Data(format!(
                "{} needs at least one feature column and one label column",
                path
            )));
        }
        let features: Vec<String> = headers
            .iter()
            .skip(skip)
            .take(headers.len() - skip - 1)
            .map(String::from)
            .collect();

        let mut values: Vec<f64> = Vec::new();
        let mut y: Vec<u8> = Vec::new();
        let mut samples: Vec<String> = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                return Err(SemoosError::Data(format!(
                    "line {} has {} fields, expected {}",
                    line + 2,
                    record.len(),
                    headers.len()
                )));
            }
            samples.push(if sample_column {
                record[0].to_string()
            } else {
                format!("sample_{}", line)
            });
            for field in record.iter().skip(skip).take(features.len()) {
                let value = field.parse::<f64>().map_err(|_| {
                    SemoosError::Data(format!("line {}: '{}' is not a number", line + 2, field))
                })?;
                values.push(value);
            }
            let label = &record[record.len() - 1];
            let target = label.parse::<u8>().map_err(|_| {
                SemoosError::Data(format!("line {}: label '{}' is not 0 or 1", line + 2, label))
            })?;
            y.push(target);
        }

        let X = Array2::from_shape_vec((y.len(), features.len()), values)
            .map_err(|e| SemoosError::Data(e.to_string()))?;
        let mut data = Data::new(X, y)?;
        data.features = features;
        data.samples = samples;

        if data.count_class(MINORITY_CLASS) == 0 {
            warn!("{} does not contain any minority (label 1) sample", path);
        }

        Ok(data)
    }

    pub fn set_classes(&mut self, classes: Vec<String>) {
        self.classes = classes;
    }

    pub fn count_class(&self, class: u8) -> usize {
        self.y.iter().filter(|&&l| l == class).count()
    }

    /// Indices of the samples labeled with the minority class
    pub fn minority_indices(&self) -> Vec<usize> {
        self.y
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == MINORITY_CLASS)
            .map(|(i, _)| i)
            .collect()
    }

    /// Sorted distinct labels
    pub fn unique_labels(&self) -> Vec<u8> {
        let mut labels = self.y.clone();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// Rows picked by index, duplicates allowed (used to materialize bootstraps and folds)
    pub fn subset(&self, samples: &[usize]) -> Data {
        Data {
            X: self.X.select(Axis(0), samples),
            y: samples.iter().map(|&i| self.y[i]).collect(),
            features: self.features.clone(),
            samples: samples.iter().map(|&i| self.samples[i].clone()).collect(),
            feature_len: self.feature_len,
            sample_len: samples.len(),
            classes: self.classes.clone(),
        }
    }

    /// Feature matrix restricted to the given columns
    pub fn select_features(&self, features: &[usize]) -> Array2<f64> {
        self.X.select(Axis(1), features)
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minority = self.count_class(MINORITY_CLASS);
        write!(
            f,
            "Data: {} samples x {} features | {} majority / {} minority",
            self.sample_len,
            self.feature_len,
            self.sample_len - minority,
            minority
        )?;
        if self.classes.len() == 2 {
            write!(f, " ({} / {})", self.classes[0], self.classes[1])?;
        }
        Ok(())
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;

    impl Data {
        /// 20 samples on two features, 18 majority around the origin and 2 minority far away
        pub fn test() -> Data {
            let mut values = Vec::new();
            let mut y = Vec::new();
            for i in 0..18 {
                values.push((i % 6) as f64 * 0.1);
                values.push((i / 6) as f64 * 0.1);
                y.push(0);
            }
            values.extend_from_slice(&[3.0, 3.1, 3.2, 2.9]);
            y.extend_from_slice(&[1, 1]);
            Data::new(Array2::from_shape_vec((20, 2), values).unwrap(), y).unwrap()
        }
    }

    #[test]
    fn test_new_rejects_non_binary_labels() {
        let err = Data::new(array![[0.0], [1.0]], vec![0, 2]).unwrap_err();
        assert!(matches!(err, SemoosError::Data(_)));
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        let err = Data::new(array![[0.0], [1.0]], vec![0]).unwrap_err();
        assert!(matches!(err, SemoosError::Data(_)));
    }

    #[test]
    fn test_minority_indices_and_counts() {
        let data = Data::test();
        assert_eq!(data.minority_indices(), vec![18, 19]);
        assert_eq!(data.count_class(MAJORITY_CLASS), 18);
        assert_eq!(data.unique_labels(), vec![0, 1]);
    }

    #[test]
    fn test_subset_keeps_rows_and_labels_paired() {
        let data = Data::test();
        let sub = data.subset(&[19, 0, 19]);
        assert_eq!(sub.sample_len, 3);
        assert_eq!(sub.y, vec![1, 0, 1]);
        assert_eq!(sub.X.row(0), data.X.row(19));
        assert_eq!(sub.X.row(2), data.X.row(19));
        assert_eq!(sub.samples[1], "sample_0");
    }

    #[test]
    fn test_select_features_restricts_columns() {
        let data = Data::test();
        let x = data.select_features(&[1]);
        assert_eq!(x.dim(), (20, 1));
        assert_eq!(x[[19, 0]], 2.9);
    }

    #[test]
    fn test_load_data_reads_header_features_and_labels() {
        let path = std::env::temp_dir().join("semoos_test_load_data.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "name,f1,f2,label").unwrap();
        writeln!(file, "a,0.5,1.5,0").unwrap();
        writeln!(file, "b,2.0,-1.0,1").unwrap();
        writeln!(file, "c,0.1,0.2,0").unwrap();
        drop(file);

        let data = Data::load_data(path.to_str().unwrap(), ',', true).unwrap();
        assert_eq!(data.features, vec!["f1", "f2"]);
        assert_eq!(data.samples, vec!["a", "b", "c"]);
        assert_eq!(data.y, vec![0, 1, 0]);
        assert_eq!(data.X[[1, 1]], -1.0);
        assert_eq!((data.sample_len, data.feature_len), (3, 2));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_load_data_rejects_non_numeric_feature() {
        let path = std::env::temp_dir().join("semoos_test_load_data_bad.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "f1,label").unwrap();
        writeln!(file, "oops,0").unwrap();
        drop(file);

        assert!(matches!(
            Data::load_data(path.to_str().unwrap(), ',', false),
            Err(SemoosError::Data(_))
        ));
        let _ = std::fs::remove_file(path);
    }
}
