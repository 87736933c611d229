use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::naming::{self, NamingError};
use crate::variant::{ORIGINAL_LABEL, Size, VariantSpec};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Duplicate variant label: {0}")]
    DuplicateVariantLabel(String),

    #[error("Invalid variant label '{label}': {reason}")]
    InvalidVariantLabel { label: String, reason: &'static str },

    #[error("Variant '{label}' has an empty target size {size}")]
    EmptyVariantSize { label: String, size: Size },

    #[error(transparent)]
    Naming(#[from] NamingError),
}

/// An uploaded original image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Encoded name, see [`crate::naming`].
    pub name: String,
    pub owner_id: u64,
    /// `<media_root>/images/YYYY/MM/DD/<name>`
    pub storage_path: PathBuf,
    pub original_size: Size,
}

/// Where one derivative of an asset lives and how large it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAssetDescriptor {
    pub label: String,
    pub size: Size,
    pub path: PathBuf,
}

/// Label -> descriptor. Ordered so serialized jobs are stable.
pub type DescriptorMap = BTreeMap<String, DerivedAssetDescriptor>;

/// Expand an asset and the configured variants into the full descriptor map.
///
/// Always contains [`ORIGINAL_LABEL`] pointing at the stored original with its
/// real dimensions. Every other entry sits next to the original under
/// [`naming::derived_name`].
pub fn plan(asset: &Asset, variants: &[VariantSpec]) -> Result<DescriptorMap, PlanError> {
    validate_variants(variants)?;
    let decoded = naming::decode(&asset.name)?;
    let dir = asset.storage_path.parent().unwrap_or_else(|| Path::new(""));

    let mut map = DescriptorMap::new();
    map.insert(
        ORIGINAL_LABEL.to_string(),
        DerivedAssetDescriptor {
            label: ORIGINAL_LABEL.to_string(),
            size: asset.original_size,
            path: asset.storage_path.clone(),
        },
    );

    for spec in variants {
        map.insert(
            spec.label.clone(),
            DerivedAssetDescriptor {
                label: spec.label.clone(),
                size: spec.target_size(),
                path: dir.join(decoded.derived(&spec.label)),
            },
        );
    }

    Ok(map)
}

/// Reject variant lists that [`plan`] would refuse, before any upload happens.
pub fn validate_variants(variants: &[VariantSpec]) -> Result<(), PlanError> {
    let mut seen = HashSet::with_capacity(variants.len() + 1);
    seen.insert(ORIGINAL_LABEL);
    for spec in variants {
        check_label(&spec.label)?;
        let size = spec.target_size();
        if size.width == 0 || size.height == 0 {
            return Err(PlanError::EmptyVariantSize {
                label: spec.label.clone(),
                size,
            });
        }
        if !seen.insert(spec.label.as_str()) {
            return Err(PlanError::DuplicateVariantLabel(spec.label.clone()));
        }
    }
    Ok(())
}

/// A label becomes one `-` segment of a file name in the asset's directory.
///
/// All-digit labels would make derived names decode as originals.
fn check_label(label: &str) -> Result<(), PlanError> {
    let invalid = |reason| {
        Err(PlanError::InvalidVariantLabel {
            label: label.to_string(),
            reason,
        })
    };

    if label.is_empty() {
        return invalid("label is empty");
    }
    if label.bytes().all(|b| b.is_ascii_digit()) {
        return invalid("label is all digits");
    }
    if label.contains(['/', '\\']) {
        return invalid("label contains a path separator");
    }
    if label.contains(['.', '-']) {
        return invalid("label contains '.' or '-'");
    }
    if label.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return invalid("label contains whitespace or control characters");
    }
    Ok(())
}

/// Label -> path relative to `media_root`, for building public URLs.
///
/// Descriptors outside `media_root` keep their full path.
pub fn url_paths(descriptors: &DescriptorMap, media_root: &Path) -> BTreeMap<String, String> {
    descriptors
        .iter()
        .map(|(label, d)| {
            let rel = d.path.strip_prefix(media_root).unwrap_or(&d.path);
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            (label.clone(), rel)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::default_variants;

    fn asset() -> Asset {
        Asset {
            name: "me-7-1709769600000000001.jpg".into(),
            owner_id: 7,
            storage_path: PathBuf::from("/srv/media/images/2024/03/07/me-7-1709769600000000001.jpg"),
            original_size: Size::new(640, 480),
        }
    }

    #[test]
    fn plan_includes_original_and_every_variant() {
        let variants = default_variants();
        let map = plan(&asset(), &variants).unwrap();

        assert_eq!(map.len(), variants.len() + 1);
        let original = &map[ORIGINAL_LABEL];
        assert_eq!(original.path, asset().storage_path);
        assert_eq!(original.size, Size::new(640, 480));

        let thumb = &map["thumbnail"];
        assert_eq!(thumb.size, Size::new(20, 40));
        assert_eq!(
            thumb.path,
            PathBuf::from("/srv/media/images/2024/03/07/me-7-1709769600000000001-thumbnail.jpg")
        );
    }

    #[test]
    fn plan_is_deterministic() {
        let variants = default_variants();
        assert_eq!(
            plan(&asset(), &variants).unwrap(),
            plan(&asset(), &variants).unwrap()
        );
    }

    #[test]
    fn plan_with_no_variants_has_only_original() {
        let map = plan(&asset(), &[]).unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(ORIGINAL_LABEL));
    }

    #[test]
    fn duplicate_label_rejected() {
        let variants = vec![
            VariantSpec::new("thumb", (20, 40), true),
            VariantSpec::new("thumb", (40, 30), false),
        ];
        assert_eq!(
            plan(&asset(), &variants),
            Err(PlanError::DuplicateVariantLabel("thumb".into()))
        );
        assert!(validate_variants(&variants).is_err());
    }

    #[test]
    fn variant_named_original_rejected() {
        let variants = vec![VariantSpec::new(ORIGINAL_LABEL, (1, 1), false)];
        assert!(matches!(
            plan(&asset(), &variants),
            Err(PlanError::DuplicateVariantLabel(_))
        ));
    }

    #[test]
    fn labels_that_break_derived_names_rejected() {
        for label in ["", "100", "x/../../etc/y", "a\\b", "small.v2", "sm-all", "a b"] {
            let variants = vec![VariantSpec::new(label, (10, 10), false)];
            assert!(
                matches!(
                    validate_variants(&variants),
                    Err(PlanError::InvalidVariantLabel { .. })
                ),
                "{label:?}"
            );
            assert!(plan(&asset(), &variants).is_err(), "{label:?}");
        }
    }

    #[test]
    fn derived_names_never_decode_as_originals() {
        let map = plan(&asset(), &default_variants()).unwrap();
        for (label, d) in &map {
            if label == ORIGINAL_LABEL {
                continue;
            }
            let name = d.path.file_name().unwrap().to_str().unwrap();
            assert!(naming::decode(name).is_err(), "{name}");
            assert_eq!(d.path.parent(), asset().storage_path.parent());
        }
    }

    #[test]
    fn zero_dimension_rejected() {
        let variants = vec![
            VariantSpec::new("a", (4, 3), false),
            VariantSpec::new("b", (0, 3), false),
        ];
        assert_eq!(
            validate_variants(&variants),
            Err(PlanError::EmptyVariantSize {
                label: "b".into(),
                size: Size::new(0, 3)
            })
        );
    }

    #[test]
    fn underscore_and_alphanumeric_labels_accepted() {
        let variants = vec![
            VariantSpec::new("thumb_2x", (40, 80), true),
            VariantSpec::new("v2", (10, 10), false),
        ];
        assert!(validate_variants(&variants).is_ok());
    }

    #[test]
    fn malformed_asset_name_rejected() {
        let mut bad = asset();
        bad.name = "noextensionordashes".into();
        assert!(matches!(plan(&bad, &[]), Err(PlanError::Naming(_))));
    }

    #[test]
    fn url_paths_are_relative_to_media_root() {
        let map = plan(&asset(), &default_variants()).unwrap();
        let urls = url_paths(&map, Path::new("/srv/media"));
        assert_eq!(
            urls[ORIGINAL_LABEL],
            "images/2024/03/07/me-7-1709769600000000001.jpg"
        );
        assert_eq!(urls.len(), map.len());
    }
}
