use crate::{catalog::CatalogError, figure::FigureError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `catalog` module")]
    Catalog(#[from] CatalogError),
    #[error("Error in the `figure` module")]
    Figure(#[from] FigureError),
}
