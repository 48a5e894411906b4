//! Access modes for data proxies.
//!
//! The mode decides whether the block is borrowed shared or exclusively,
//! whether the copy path fills its buffer from the block, and whether it
//! writes the buffer back on release.

mod sealed {
    pub trait Sealed {}
}

/// Runtime mirror of an access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    In,
    Out,
    InOut,
}

/// Type-level access mode.
pub trait AccessMode: sealed::Sealed + 'static {
    const KIND: AccessKind;
    /// Copy path fills the buffer from the block.
    const READS: bool;
    /// Copy path writes the buffer back to the block on release.
    const WRITES: bool;
}

/// Access modes that may modify the block.
pub trait WriteMode: AccessMode {}

/// Read-only access.
#[derive(Debug, Clone, Copy)]
pub struct In;

/// Write-only access: the buffer is not filled from the block.
#[derive(Debug, Clone, Copy)]
pub struct Out;

/// Read-write access.
#[derive(Debug, Clone, Copy)]
pub struct InOut;

impl sealed::Sealed for In {}
impl sealed::Sealed for Out {}
impl sealed::Sealed for InOut {}

impl AccessMode for In {
    const KIND: AccessKind = AccessKind::In;
    const READS: bool = true;
    const WRITES: bool = false;
}

impl AccessMode for Out {
    const KIND: AccessKind = AccessKind::Out;
    const READS: bool = false;
    const WRITES: bool = true;
}

impl AccessMode for InOut {
    const KIND: AccessKind = AccessKind::InOut;
    const READS: bool = true;
    const WRITES: bool = true;
}

impl WriteMode for Out {}
impl WriteMode for InOut {}
