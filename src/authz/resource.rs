use genera_models::ids::{CommunityId, GenerationId, SchoolId, UserId};
use genera_models::organizations::{Community, School};
use genera_models::profiles::Profile;

/// Organizational position of the record an action targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceScope {
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
    /// Profile that owns the record.
    pub owner_id: Option<UserId>,
    /// The record is the school itself, so `_own` grants cover the caller's
    /// own school.
    pub is_school_record: bool,
}

impl ResourceScope {
    /// A resource outside any organization; only `_all` grants cover it.
    pub fn global() -> Self {
        Self::default()
    }

    pub fn profile(profile: &Profile) -> Self {
        Self {
            school_id: profile.school_id,
            generation_id: profile.generation_id,
            community_id: profile.community_id,
            owner_id: Some(profile.id),
            is_school_record: false,
        }
    }

    pub fn school(school_id: SchoolId) -> Self {
        Self {
            school_id: Some(school_id),
            is_school_record: true,
            ..Self::default()
        }
    }

    pub fn school_record(school: &School) -> Self {
        Self::school(school.id)
    }

    /// Something that lives inside a school without being the school.
    pub fn within_school(school_id: Option<SchoolId>) -> Self {
        Self {
            school_id,
            ..Self::default()
        }
    }

    pub fn community(community: &Community) -> Self {
        Self {
            school_id: Some(community.school_id),
            generation_id: community.generation_id,
            community_id: Some(community.id),
            ..Self::default()
        }
    }
}
