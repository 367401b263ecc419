//! Addon requirements: references from one addon to others, by URL
//! (absolute or relative to the addon's endpoints) or, for legacy addons,
//! by bare ID.

use mediaurl_core::AddonDescriptor;

use crate::addon_url::{clean_addon_url, strip_addon_url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedRequirement {
    /// Bare addon ID from a legacy addon.
    pub legacy_id: Option<String>,
    /// Clean base URLs the required addon may live at.
    pub endpoints: Vec<String>,
}

pub trait Requirements {
    fn converted_requirements(&self) -> Vec<ConvertedRequirement>;

    /// True if this addon satisfies `req`.
    fn matches_requirement(&self, req: &ConvertedRequirement) -> bool;

    /// True if `other` is one of this addon's requirements.
    fn has_requirement(&self, other: &AddonDescriptor) -> bool;
}

impl Requirements for AddonDescriptor {
    fn converted_requirements(&self) -> Vec<ConvertedRequirement> {
        let legacy = self.is_legacy();
        self.requirements
            .iter()
            .map(|req| {
                let mut legacy_id = None;
                let mut endpoints: Vec<String> = Vec::new();
                if req.contains("//") {
                    endpoints.push(strip_addon_url(req));
                } else if legacy && !req.contains('/') {
                    legacy_id = Some(req.clone());
                } else {
                    for endpoint in &self.endpoints {
                        match clean_addon_url(req, Some(endpoint), None, None, false) {
                            Ok(url) if !endpoints.contains(&url) => endpoints.push(url),
                            Ok(_) => {}
                            Err(e) => {
                                tracing::debug!(addon = %self.id, requirement = %req, err = %e.reason, "Unresolvable requirement");
                            }
                        }
                    }
                }
                ConvertedRequirement {
                    legacy_id,
                    endpoints,
                }
            })
            .collect()
    }

    fn matches_requirement(&self, req: &ConvertedRequirement) -> bool {
        if self.endpoints.iter().any(|e| req.endpoints.contains(e)) {
            if let Some(id) = req.legacy_id.as_deref().filter(|id| *id != self.id) {
                tracing::warn!(
                    addon = %self.id,
                    legacy_id = %id,
                    "Matched requirement via endpoints, but not via ID"
                );
                return false;
            }
            return true;
        }
        req.legacy_id.as_deref() == Some(self.id.as_str())
    }

    fn has_requirement(&self, other: &AddonDescriptor) -> bool {
        let reqs = self.converted_requirements();
        reqs.iter()
            .any(|req| req.endpoints.iter().any(|e| other.endpoints.contains(e)))
            || reqs
                .iter()
                .any(|req| req.legacy_id.as_deref() == Some(other.id.as_str()))
    }
}
