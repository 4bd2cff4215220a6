//! Version propagation and bounds checking.
//!
//! Every entity carries a `(sinceVersion, deprecatedSince)` pair inherited
//! from its parent and bounded by the schema version. The checks here are
//! shared by fields, messages, interfaces and frames.

use crate::error::{Error, ErrorKind, Result};
use crate::logger::Logger;
use crate::xml::{self, PropsMap, XmlNode};

/// Sentinel for entities that have not been deprecated.
pub const NOT_YET_DEPRECATED: u32 = u32::MAX;

/// Validates explicit `sinceVersion`/`deprecated` values against the
/// parent's bounds and the schema version.
pub fn check_versions(
    node: &XmlNode,
    since: u32,
    deprecated: u32,
    schema_version: u32,
    parent_since: u32,
    parent_deprecated: u32,
    logger: &Logger,
) -> Result<()> {
    debug_assert!(parent_since < parent_deprecated);

    let fail = |msg: String| -> Result<()> {
        let msg = format!("{}{}", node.log_prefix(), msg);
        logger.error(&msg);
        Err(Error::new(ErrorKind::VersionError, msg))
    };

    if schema_version < since {
        return fail(format!(
            "The value of \"sinceVersion\" property ({}) cannot be greater than value of \
             \"version\" property of the schema ({}).",
            since, schema_version
        ));
    }

    if since < parent_since {
        return fail(format!(
            "The value of \"sinceVersion\" property ({}) cannot be less than {}.",
            since, parent_since
        ));
    }

    if parent_deprecated <= since {
        return fail(format!(
            "The value of \"sinceVersion\" property ({}) must be less than {}.",
            since, parent_deprecated
        ));
    }

    if parent_deprecated < deprecated {
        return fail(format!(
            "The value of \"deprecated\" property ({}) cannot be greater than {}.",
            deprecated, parent_deprecated
        ));
    }

    if deprecated <= since {
        return fail(format!(
            "The value of \"deprecated\" property ({}) must be greater than value of \
             \"sinceVersion\" property ({}).",
            deprecated, since
        ));
    }

    if deprecated < NOT_YET_DEPRECATED && schema_version < deprecated {
        return fail(format!(
            "The value of \"deprecated\" property ({}) cannot be greater than value of \
             \"version\" property of the schema ({}).",
            deprecated, schema_version
        ));
    }

    Ok(())
}

/// Reads `sinceVersion`/`deprecated` from `props` (falling back to the
/// parent bounds passed in through `since`/`deprecated`) and validates the
/// result.
pub fn get_and_check_versions(
    node: &XmlNode,
    name: &str,
    props: &PropsMap,
    since: &mut u32,
    deprecated: &mut u32,
    schema_version: u32,
    logger: &Logger,
) -> Result<()> {
    let parent_since = *since;
    let parent_deprecated = *deprecated;

    if let Some(value) = props.get("sinceVersion") {
        *since = crate::text::parse_unsigned(value)
            .ok_or_else(|| xml::unexpected_prop_value(node, name, "sinceVersion", value, logger))?;
    }

    if let Some(value) = props.get("deprecated") {
        *deprecated = crate::text::parse_unsigned(value)
            .ok_or_else(|| xml::unexpected_prop_value(node, name, "deprecated", value, logger))?;
    }

    check_versions(
        node,
        *since,
        *deprecated,
        schema_version,
        parent_since,
        parent_deprecated,
        logger,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDoc;

    fn node() -> XmlNode {
        XmlDoc::parse("t.xml", "<int name=\"F\"/>", &Logger::default())
            .unwrap()
            .root
    }

    #[test]
    fn since_beyond_schema_version_fails() {
        let logger = Logger::default();
        let err = check_versions(&node(), 5, NOT_YET_DEPRECATED, 4, 0, NOT_YET_DEPRECATED, &logger)
            .unwrap_err();
        assert_eq!(ErrorKind::VersionError, err.kind());
    }

    #[test]
    fn since_must_precede_deprecated() {
        let logger = Logger::default();
        assert!(check_versions(&node(), 2, 2, 4, 0, NOT_YET_DEPRECATED, &logger).is_err());
        assert!(check_versions(&node(), 1, 2, 4, 0, NOT_YET_DEPRECATED, &logger).is_ok());
    }

    #[test]
    fn child_bounds_nest_inside_parent() {
        let logger = Logger::default();
        // Child may not appear before its parent.
        assert!(check_versions(&node(), 1, NOT_YET_DEPRECATED, 4, 2, NOT_YET_DEPRECATED, &logger).is_err());
        // Child may not outlive the parent's deprecation.
        assert!(check_versions(&node(), 2, 4, 4, 2, 3, &logger).is_err());
    }
}
