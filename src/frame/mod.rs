//! NAN action frames: attributes, header, composition and parsing.

pub mod action;
pub mod attribute;
pub(crate) mod compose;
pub(crate) mod parse;

pub use action::{ActionFrame, ActionSubtype, CATEGORY_OFFSET, HEADER_LEN};
pub use attribute::{
    Attribute, CipherSuiteInfo, DataPathAttribute, DeviceCapability, NdlAttribute, NdlType,
    NdpType, SecurityContext, SharedKey,
};
