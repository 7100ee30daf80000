//! Direct HDF5 access, for stores too large to load up front.
//!
//! Layout: 1-D integer datasets `index`, `index_absolute`, `index_window`
//! and one 2-D `[rows, samples]` float dataset per feature, all at the root.

use std::borrow::Cow;
use std::ops::Range;
use std::path::Path;

use ::hdf5::{Dataset, File};
use ndarray::s;

use super::model::{INDEX, INDEX_ABSOLUTE, INDEX_COLUMNS, INDEX_WINDOW, WindowStore, check_rows};
use crate::error::{AccessError, Result};

impl From<::hdf5::Error> for AccessError {
    fn from(err: ::hdf5::Error) -> Self {
        AccessError::Store(err.to_string())
    }
}

/// A store backed by an open HDF5 file.
///
/// The bookkeeping columns are read once on open; feature slices are read
/// from disk on every call.
pub struct Hdf5Store {
    file: File,
    index: Vec<i64>,
    index_absolute: Vec<i64>,
    features: Vec<String>,
}

impl Hdf5Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;

        let index = read_column(&file, INDEX)?;
        let index_absolute = read_column(&file, INDEX_ABSOLUTE)?;
        if index_absolute.len() != index.len() {
            return Err(AccessError::ColumnLength {
                column: INDEX_ABSOLUTE.to_string(),
                expected: index.len(),
                found: index_absolute.len(),
            });
        }

        let mut features: Vec<String> = file
            .member_names()?
            .into_iter()
            .filter(|name| !INDEX_COLUMNS.contains(&name.as_str()))
            .filter(|name| file.dataset(name).map(|d| d.ndim() == 2).unwrap_or(false))
            .collect();
        features.sort();

        log::info!(
            "opened {} ({} windows, {} features)",
            path.as_ref().display(),
            index.len(),
            features.len()
        );
        Ok(Self {
            file,
            index,
            index_absolute,
            features,
        })
    }

    fn dataset(&self, name: &str) -> Result<Dataset> {
        self.file
            .dataset(name)
            .map_err(|_| AccessError::MissingColumn(name.to_string()))
    }
}

fn read_column(file: &File, name: &str) -> Result<Vec<i64>> {
    let ds = file
        .dataset(name)
        .map_err(|_| AccessError::MissingColumn(name.to_string()))?;
    Ok(ds.read_raw::<i64>()?)
}

impl WindowStore for Hdf5Store {
    fn num_rows(&self) -> usize {
        self.index.len()
    }

    fn subject_index(&self) -> Result<Cow<'_, [i64]>> {
        Ok(Cow::Borrowed(&self.index))
    }

    fn absolute_index(&self) -> Result<Cow<'_, [i64]>> {
        Ok(Cow::Borrowed(&self.index_absolute))
    }

    fn window_index(&self, rows: Range<usize>) -> Result<Vec<i64>> {
        check_rows(&rows, self.num_rows())?;
        let ds = self.dataset(INDEX_WINDOW)?;
        Ok(ds.read_slice_1d::<i64, _>(s![rows.start..rows.end])?.to_vec())
    }

    fn feature_blocks(&self, feature: &str, rows: Range<usize>) -> Result<Vec<Vec<f64>>> {
        let ds = self.dataset(feature)?;
        let n_rows = ds.shape().first().copied().unwrap_or(0);
        check_rows(&rows, n_rows)?;

        let block = ds.read_slice_2d::<f64, _>(s![rows.start..rows.end, ..])?;
        Ok(block.outer_iter().map(|row| row.to_vec()).collect())
    }

    fn feature_names(&self) -> Vec<String> {
        self.features.clone()
    }
}

#[cfg(all(test, feature = "hdf5"))]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    fn write_store(path: &Path) {
        let file = File::create(path).unwrap();
        file.new_dataset_builder()
            .with_data(&arr1(&[3i64, 3, 3, 4]))
            .create(INDEX)
            .unwrap();
        file.new_dataset_builder()
            .with_data(&arr1(&[0i64, 1, 2, 3]))
            .create(INDEX_ABSOLUTE)
            .unwrap();
        file.new_dataset_builder()
            .with_data(&arr1(&[0i64, 1, 2, 0]))
            .create(INDEX_WINDOW)
            .unwrap();
        file.new_dataset_builder()
            .with_data(&arr2(&[[0.0f64, 0.5], [1.0, 1.5], [2.0, 2.5], [3.0, 3.5]]))
            .create("pulse")
            .unwrap();
    }

    #[test]
    fn reads_slices_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.h5");
        write_store(&path);

        let store = Hdf5Store::open(&path).unwrap();
        assert_eq!(store.num_rows(), 4);
        assert_eq!(store.feature_names(), vec!["pulse".to_string()]);
        assert_eq!(store.subject_index().unwrap().as_ref(), &[3, 3, 3, 4]);

        assert_eq!(store.window_index(1..3).unwrap(), vec![1, 2]);
        assert_eq!(
            store.feature_blocks("pulse", 2..4).unwrap(),
            vec![vec![2.0, 2.5], vec![3.0, 3.5]]
        );
    }

    #[test]
    fn out_of_range_rows_and_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.h5");
        write_store(&path);
        let store = Hdf5Store::open(&path).unwrap();

        assert!(matches!(
            store.feature_blocks("pulse", 3..6),
            Err(AccessError::RowRangeOutOfBounds { len: 4, .. })
        ));
        assert!(matches!(
            store.window_index(2..9),
            Err(AccessError::RowRangeOutOfBounds { .. })
        ));
        assert!(matches!(
            store.feature_blocks("eeg", 0..1),
            Err(AccessError::MissingColumn(_))
        ));
    }
}
