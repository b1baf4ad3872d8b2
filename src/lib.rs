/*!
# plotpdf

Renders the binned posterior probability surfaces produced by the galstar
sampler into paginated heat-map pages.

## Key components

- [`CatalogLoader`] - loads paired statistics/bins files into a [`Catalog`]
- [`smooth::smooth_surfaces`] - Gaussian smoothing of the binned surfaces
- [`Page`] - composes a grid of surfaces into a [`Figure`]
- [`paginate`] - splits a star range into fixed-size grid pages
*/

mod error;

pub mod catalog;
pub mod figure;
pub mod pages;
pub mod params;
pub mod smooth;
pub mod surface;

pub use catalog::{Catalog, CatalogLoader};
pub use error::Error;
pub use figure::{Figure, Page, PageStyle};
pub use pages::{paginate, PageSpec};
pub use params::AxisParam;
pub use surface::{Bounds, Surface};
