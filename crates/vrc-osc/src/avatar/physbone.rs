//! PhysBone parameter groups
//!
//! A PhysBone with a parameter name `Tail` exposes `Tail_IsGrabbed` (Bool),
//! `Tail_Angle` (Float) and `Tail_Stretch` (Float). The avatar config only
//! lists flat parameters, so groups are recovered from the naming convention.

use super::avatar_parameter_address;
use super::config::DeclaredParameter;
use crate::registry::ParameterRegistry;
use crate::types::ParameterType;
use std::collections::BTreeMap;

const IS_GRABBED: &str = "IsGrabbed";
const ANGLE: &str = "Angle";
const STRETCH: &str = "Stretch";

/// A complete, type-checked PhysBone parameter group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysBone {
    param_name: String,
    is_grabbed: DeclaredParameter,
    angle: DeclaredParameter,
    stretch: DeclaredParameter,
}

impl PhysBone {
    /// Shared prefix of the three member parameters
    pub fn param_name(&self) -> &str {
        &self.param_name
    }

    pub fn is_grabbed_parameter(&self) -> &DeclaredParameter {
        &self.is_grabbed
    }

    pub fn angle_parameter(&self) -> &DeclaredParameter {
        &self.angle
    }

    pub fn stretch_parameter(&self) -> &DeclaredParameter {
        &self.stretch
    }

    /// Whether the bone is currently grabbed (false until a value arrives)
    pub fn is_grabbed(&self, registry: &ParameterRegistry) -> bool {
        registry
            .get(&avatar_parameter_address(&self.is_grabbed.name))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Current angle (0.0 until a value arrives)
    pub fn angle(&self, registry: &ParameterRegistry) -> f32 {
        registry
            .get(&avatar_parameter_address(&self.angle.name))
            .and_then(|v| v.as_f32())
            .unwrap_or(0.0)
    }

    /// Current stretch (0.0 until a value arrives)
    pub fn stretch(&self, registry: &ParameterRegistry) -> f32 {
        registry
            .get(&avatar_parameter_address(&self.stretch.name))
            .and_then(|v| v.as_f32())
            .unwrap_or(0.0)
    }
}

/// Member slot while collecting candidates; a suffix seen twice is ambiguous
#[derive(Clone, Copy, Default)]
enum Slot<'a> {
    #[default]
    Empty,
    One(&'a DeclaredParameter),
    Ambiguous,
}

impl<'a> Slot<'a> {
    fn fill(&mut self, param: &'a DeclaredParameter) {
        *self = match *self {
            Slot::Empty => Slot::One(param),
            _ => Slot::Ambiguous,
        };
    }

    fn take_typed(self, required: ParameterType) -> Option<&'a DeclaredParameter> {
        match self {
            Slot::One(param) if param.parameter_type == required => Some(param),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Candidate<'a> {
    is_grabbed: Slot<'a>,
    angle: Slot<'a>,
    stretch: Slot<'a>,
}

/// Reconstruct PhysBone groups from a flat parameter list
///
/// Names are split on their last underscore. A prefix becomes a group only if
/// it has exactly one `IsGrabbed` (Bool), one `Angle` (Float) and one
/// `Stretch` (Float); anything else under the prefix is ignored. Incomplete or
/// mistyped candidates are dropped without error. The result is sorted by
/// parameter name and does not depend on input order.
pub fn classify_physbones(parameters: &[DeclaredParameter]) -> Vec<PhysBone> {
    let mut candidates: BTreeMap<&str, Candidate> = BTreeMap::new();

    for param in parameters {
        let Some((prefix, suffix)) = param.name.rsplit_once('_') else {
            continue;
        };
        if prefix.is_empty() {
            continue;
        }

        let candidate = candidates.entry(prefix).or_default();
        match suffix {
            IS_GRABBED => candidate.is_grabbed.fill(param),
            ANGLE => candidate.angle.fill(param),
            STRETCH => candidate.stretch.fill(param),
            _ => {}
        }
    }

    candidates
        .into_iter()
        .filter_map(|(prefix, candidate)| {
            Some(PhysBone {
                param_name: prefix.to_string(),
                is_grabbed: candidate.is_grabbed.take_typed(ParameterType::Bool)?.clone(),
                angle: candidate.angle.take_typed(ParameterType::Float)?.clone(),
                stretch: candidate.stretch.take_typed(ParameterType::Float)?.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParameterValue;
    use crate::types::ParameterType::{Bool, Float, Int};

    fn p(name: &str, ty: ParameterType, has_input: bool) -> DeclaredParameter {
        DeclaredParameter::new(name, ty, has_input)
    }

    fn fixture() -> Vec<DeclaredParameter> {
        vec![
            p("ValidParam1_IsGrabbed", Bool, true),
            p("ValidParam1_Angle", Float, true),
            p("ValidParam1_Stretch", Float, true),
            p("ValidParam2_IsGrabbed", Bool, false),
            p("ValidParam2_Angle", Float, false),
            p("ValidParam2_Stretch", Float, false),
            p("ValidParam3_Angle", Float, true),
            p("ValidParam3_Stretch", Float, true),
            p("ValidParam3_IsGrabbed", Bool, true),
            p("ValidParam3_SomeValue", Float, true),
            p("InvalidParam1_IsGrabbed", Bool, true),
            p("InvalidParam1_Angle", Int, true),
            p("InvalidParam1_Stretch", Float, true),
            p("InvalidParam2_IsGrabbed", Float, true),
            p("InvalidParam2_Angle", Float, true),
            p("InvalidParam2_Stretch", Float, true),
            p("InvalidParam3_IsGrabbed", Bool, true),
            p("InvalidParam3_Angle", Float, true),
            p("InvalidParam3_Stretch", Bool, true),
            p("InvalidParam4_Angle", Float, true),
            p("InvalidParam4_Stretch", Float, true),
            p("InvalidParam5_IsGrabbed", Bool, true),
            p("InvalidParam5_Stretch", Float, true),
            p("InvalidParam6_SomeValue", Bool, true),
            p("InvalidParam6_Angle", Float, true),
            p("InvalidParam6_Stretch", Float, true),
            p("InvalidParam7IsGrabbed", Bool, true),
            p("InvalidParam7Angle", Float, true),
            p("InvalidParam7Stretch", Float, true),
            p("TestParam", Float, true),
        ]
    }

    fn names(bones: &[PhysBone]) -> Vec<&str> {
        bones.iter().map(|b| b.param_name()).collect()
    }

    #[test]
    fn test_classify_fixture() {
        let bones = classify_physbones(&fixture());
        assert_eq!(names(&bones), vec!["ValidParam1", "ValidParam2", "ValidParam3"]);

        let bone = &bones[2];
        assert_eq!(bone.is_grabbed_parameter().name, "ValidParam3_IsGrabbed");
        assert_eq!(bone.angle_parameter().name, "ValidParam3_Angle");
        assert_eq!(bone.stretch_parameter().name, "ValidParam3_Stretch");
    }

    #[test]
    fn test_classify_is_order_independent() {
        let mut params = fixture();
        let forward = classify_physbones(&params);
        params.reverse();
        assert_eq!(classify_physbones(&params), forward);
        params.rotate_left(7);
        assert_eq!(classify_physbones(&params), forward);
    }

    #[test]
    fn test_duplicate_member_is_ambiguous() {
        let params = vec![
            p("Tail_IsGrabbed", Bool, true),
            p("Tail_Angle", Float, true),
            p("Tail_Angle", Float, false),
            p("Tail_Stretch", Float, true),
        ];
        assert!(classify_physbones(&params).is_empty());
    }

    #[test]
    fn test_prefix_with_underscores() {
        let params = vec![
            p("Hair_Left_IsGrabbed", Bool, true),
            p("Hair_Left_Angle", Float, true),
            p("Hair_Left_Stretch", Float, true),
        ];
        assert_eq!(names(&classify_physbones(&params)), vec!["Hair_Left"]);
    }

    #[test]
    fn test_empty_prefix_is_ignored() {
        let params = vec![
            p("_IsGrabbed", Bool, true),
            p("_Angle", Float, true),
            p("_Stretch", Float, true),
        ];
        assert!(classify_physbones(&params).is_empty());
    }

    #[test]
    fn test_member_values() {
        let bones = classify_physbones(&fixture());
        let bone = &bones[0];
        let registry = ParameterRegistry::new();

        assert!(!bone.is_grabbed(&registry));
        assert_eq!(bone.angle(&registry), 0.0);

        registry.update("/avatar/parameters/ValidParam1_IsGrabbed", ParameterValue::Bool(true));
        registry.update("/avatar/parameters/ValidParam1_Angle", ParameterValue::Float32(0.5));
        registry.update("/avatar/parameters/ValidParam1_Stretch", ParameterValue::Float32(0.25));

        assert!(bone.is_grabbed(&registry));
        assert_eq!(bone.angle(&registry), 0.5);
        assert_eq!(bone.stretch(&registry), 0.25);
    }
}
