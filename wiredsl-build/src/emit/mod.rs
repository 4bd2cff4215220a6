//! Emission modules: every IR variant owns an emitter reading the frozen IR
//! through the shared [`Generator`](crate::generator::Generator) context.

mod build_meta;
pub(crate) mod field;
mod frame;
mod interface;
mod message;
mod project;

use wiredsl::Result;

use crate::generator::Generator;

/// Walks the IR and writes the whole output tree.
pub(crate) fn write_all(generator: &Generator<'_>) -> Result<()> {
    field::write_all(generator)?;
    interface::write_all(generator)?;
    message::write_all(generator)?;
    frame::write_all(generator)?;
    project::write_all(generator)?;
    build_meta::write(generator)?;
    Ok(())
}
