//! Row filters for list endpoints.
//!
//! A [`Visibility`] is derived from the caller's grants of one permission
//! base and is handed to the store, which applies it as a `WHERE` clause (or
//! an in-memory filter).

use std::collections::BTreeSet;

use crate::consultants::ConsultantAssignment;
use crate::ids::{CommunityId, GenerationId, SchoolId, UserId};
use crate::organizations::School;
use crate::profiles::Profile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Everything,
    Restricted {
        school_ids: BTreeSet<SchoolId>,
        generation_ids: BTreeSet<GenerationId>,
        community_ids: BTreeSet<CommunityId>,
        /// Set when the caller may see their own record.
        user_id: Option<UserId>,
    },
}

impl Visibility {
    pub fn allows_profile(&self, profile: &Profile) -> bool {
        match self {
            Visibility::Everything => true,
            Visibility::Restricted {
                school_ids,
                generation_ids,
                community_ids,
                user_id,
            } => {
                *user_id == Some(profile.id)
                    || profile.school_id.is_some_and(|s| school_ids.contains(&s))
                    || profile
                        .generation_id
                        .is_some_and(|g| generation_ids.contains(&g))
                    || profile
                        .community_id
                        .is_some_and(|c| community_ids.contains(&c))
            }
        }
    }

    pub fn allows_school(&self, school: &School) -> bool {
        match self {
            Visibility::Everything => true,
            Visibility::Restricted { school_ids, .. } => school_ids.contains(&school.id),
        }
    }

    /// Matches on the assignment's anchors, or on the caller being either
    /// side of it.
    pub fn allows_assignment(&self, assignment: &ConsultantAssignment) -> bool {
        match self {
            Visibility::Everything => true,
            Visibility::Restricted {
                school_ids,
                generation_ids,
                community_ids,
                user_id,
            } => {
                user_id.is_some_and(|me| {
                    assignment.consultant_id == me || assignment.student_id == Some(me)
                }) || assignment.school_id.is_some_and(|s| school_ids.contains(&s))
                    || assignment
                        .generation_id
                        .is_some_and(|g| generation_ids.contains(&g))
                    || assignment
                        .community_id
                        .is_some_and(|c| community_ids.contains(&c))
            }
        }
    }
}
