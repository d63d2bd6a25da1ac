//! Material configuration for ncfactory.
//!
//! [`MatCfg`] describes *what* to build: a data locator plus typed
//! parameters parsed from a descriptor such as
//! `"Al_sg225.ncmat;temp=20C;dcutoff=0.5"`. It is cheap to clone, detaches on
//! write, and reports every parameter read to attached [`AccessSpy`]s so
//! factory infrastructure can verify which parameters a build depended on.

/// Descriptor grammar.
pub mod descriptor;
/// `NCMATCFG[...]` blocks inside data files.
pub mod embedded;
mod matcfg;
pub mod orientation;
/// Parameter table.
pub mod param;
/// Access tracking.
pub mod spy;

pub use descriptor::IGNORE_FILE_CFG;
pub use embedded::extract_embedded_cfg;
pub use matcfg::{DataHolder, MatCfg, ScOrientation, SpyGuard, UNSET_SENTINEL};
pub use orientation::{CrystalAxis, OrientDir};
pub use param::{ParamId, ParamKind, ParamValue};
pub use spy::{AccessSpy, RecordingSpy};
