//! Linear sales model: fitting, inference and the persisted artifact
//!
//! The artifact carries the feature schema it was fitted with. Loading an
//! artifact whose schema differs from [`FEATURES`] fails instead of silently
//! feeding columns in the wrong order.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::artifacts::{self, ArtifactError};
use crate::types::{feature_vector, FeatureSource, TrainingRecord, FEATURES};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no training records left after cleaning")]
    EmptyDataset,
    #[error("regression fit failed: {0}")]
    Fit(String),
    #[error("feature schema mismatch: artifact has {found:?}, expected {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("artifact holds {coefficients} coefficients for {features} features")]
    Malformed { features: usize, coefficients: usize },
    #[error("input is missing feature '{0}'")]
    MissingFeature(String),
    #[error("failed to encode model: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode model: {0}")]
    Decode(#[source] bincode::Error),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Fitted ordinary least squares model over [`FEATURES`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesModel {
    features: Vec<String>,
    intercept: f64,
    coefficients: Vec<f64>,
}

impl SalesModel {
    /// Fit against the realized value of every record, intercept included
    pub fn fit(records: &[TrainingRecord]) -> Result<Self, ModelError> {
        if records.is_empty() {
            return Err(ModelError::EmptyDataset);
        }

        let mut flat = Vec::with_capacity(records.len() * FEATURES.len());
        for record in records {
            let row = feature_vector(record, FEATURES).map_err(ModelError::MissingFeature)?;
            flat.extend(row);
        }
        let x = Array2::from_shape_vec((records.len(), FEATURES.len()), flat)
            .map_err(|e| ModelError::Fit(e.to_string()))?;
        let y = Array1::from_iter(records.iter().map(|r| r.target_value));

        let (intercept, coefficients) = least_squares(&x, &y)?;
        let model = Self {
            features: FEATURES.iter().map(|f| f.to_string()).collect(),
            intercept,
            coefficients: coefficients.to_vec(),
        };
        debug!(
            "Fitted {} rows: intercept={} coefficients={:?}",
            records.len(),
            model.intercept,
            model.coefficients
        );
        Ok(model)
    }

    /// Build a model from known parameters
    pub fn from_parts(intercept: f64, coefficients: Vec<f64>) -> Result<Self, ModelError> {
        let model = Self {
            features: FEATURES.iter().map(|f| f.to_string()).collect(),
            intercept,
            coefficients,
        };
        model.check()?;
        Ok(model)
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Coefficients paired with their feature names
    pub fn named_coefficients(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.features
            .iter()
            .map(String::as_str)
            .zip(self.coefficients.iter().copied())
    }

    /// Predict the realized value for one input
    pub fn predict<S: FeatureSource + ?Sized>(&self, input: &S) -> Result<f64, ModelError> {
        let x = feature_vector(input, self.features.as_slice()).map_err(ModelError::MissingFeature)?;
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(&x)
            .map(|(w, v)| w * v)
            .sum();
        Ok(self.intercept + dot)
    }

    fn check(&self) -> Result<(), ModelError> {
        if self.features.iter().map(String::as_str).ne(FEATURES.iter().copied()) {
            return Err(ModelError::SchemaMismatch {
                expected: FEATURES.iter().map(|f| f.to_string()).collect(),
                found: self.features.clone(),
            });
        }
        if self.coefficients.len() != self.features.len() {
            return Err(ModelError::Malformed {
                features: self.features.len(),
                coefficients: self.coefficients.len(),
            });
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        bincode::serialize(self).map_err(ModelError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let model: Self = bincode::deserialize(bytes).map_err(ModelError::Decode)?;
        model.check()?;
        Ok(model)
    }

    /// Atomically write the artifact, creating its directory
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let bytes = self.to_bytes()?;
        artifacts::write_atomic(path, &bytes)?;
        Ok(())
    }

    /// Load the artifact; a missing file is `Ok(None)`
    pub fn load(path: &Path) -> Result<Option<Self>, ModelError> {
        match std::fs::read(path) {
            Ok(bytes) => Self::from_bytes(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ArtifactError::Io { path: path.to_path_buf(), source: e }.into()),
        }
    }
}

/// Eigenvalues below this fraction of the largest count as zero
const RANK_TOLERANCE: f64 = 1e-10;
const MAX_SWEEPS: usize = 64;

/// Minimum-norm least squares with an intercept.
///
/// Columns and target are centered, so the intercept is `mean(y) - mean(x)·β`.
/// `β` comes from the pseudo-inverse of the centered Gram matrix: directions
/// the data does not span (one vendor, one month, a single row, collinear
/// columns) get a zero coefficient instead of failing the solve.
fn least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Result<(f64, Array1<f64>), ModelError> {
    let x_mean = x.mean_axis(Axis(0)).ok_or(ModelError::EmptyDataset)?;
    let y_mean = y.mean().ok_or(ModelError::EmptyDataset)?;
    let xc = x - &x_mean;
    let yc = y - y_mean;

    let gram = xc.t().dot(&xc);
    let moment = xc.t().dot(&yc);
    let (eigenvalues, eigenvectors) = symmetric_eigen(gram);

    let largest = eigenvalues.iter().copied().fold(0.0_f64, f64::max);
    let mut beta = Array1::<f64>::zeros(x.ncols());
    let mut rank = 0;
    if largest > 0.0 {
        for (i, &lambda) in eigenvalues.iter().enumerate() {
            if lambda <= largest * RANK_TOLERANCE {
                continue;
            }
            let v = eigenvectors.column(i);
            beta.scaled_add(v.dot(&moment) / lambda, &v);
            rank += 1;
        }
    }

    let intercept = y_mean - x_mean.dot(&beta);
    if !intercept.is_finite() || beta.iter().any(|b| !b.is_finite()) {
        return Err(ModelError::Fit(format!(
            "non-finite parameters: intercept={} coefficients={}",
            intercept, beta
        )));
    }
    if rank < x.ncols() {
        debug!("Design has rank {} of {}; using the minimum-norm solution", rank, x.ncols());
    }
    Ok((intercept, beta))
}

/// Cyclic Jacobi eigendecomposition of a symmetric matrix.
/// Returns eigenvalues and the matching eigenvectors as columns.
fn symmetric_eigen(mut a: Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..MAX_SWEEPS {
        let total: f64 = a.iter().map(|x| x * x).sum();
        let diagonal: f64 = a.diag().iter().map(|x| x * x).sum();
        let off = total - diagonal;
        if off <= f64::EPSILON * f64::EPSILON * total {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}
