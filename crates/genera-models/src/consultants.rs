//! Consultant assignments.
//!
//! A consultant follows either one student (`individual`) or every member of
//! a school, generation, or growth community. Removing an assignment only
//! deactivates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use genera_core::serde::{deserialize_optional_bool, deserialize_optional_uuid};

use crate::UnknownVariant;
use crate::ids::{CommunityId, ConsultantAssignmentId, GenerationId, SchoolId, UserId};

pub const DEFAULT_ASSIGNMENT_TYPE: &str = "comprehensive";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ConsultantScope {
    #[default]
    Individual,
    School,
    Generation,
    Community,
}

impl ConsultantScope {
    pub const ALL: [ConsultantScope; 4] = [
        ConsultantScope::Individual,
        ConsultantScope::School,
        ConsultantScope::Generation,
        ConsultantScope::Community,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultantScope::Individual => "individual",
            ConsultantScope::School => "school",
            ConsultantScope::Generation => "generation",
            ConsultantScope::Community => "community",
        }
    }
}

impl FromStr for ConsultantScope {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConsultantScope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "assignment_scope",
                value: s.to_string(),
            })
    }
}

text_column!(ConsultantScope);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ConsultantAssignment {
    pub id: ConsultantAssignmentId,
    pub consultant_id: UserId,
    pub student_id: Option<UserId>,
    pub assignment_scope: ConsultantScope,
    pub assignment_type: String,
    pub can_view_progress: bool,
    pub can_assign_courses: bool,
    pub can_message_student: bool,
    /// For individual assignments, the student's school at assignment time.
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub assigned_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What an active assignment must be unique on: the consultant plus either
/// the student or, for group assignments, the anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentTarget {
    consultant_id: UserId,
    student_id: Option<UserId>,
    anchors: Option<(Option<SchoolId>, Option<GenerationId>, Option<CommunityId>)>,
}

impl AssignmentTarget {
    fn new(
        consultant_id: UserId,
        student_id: Option<UserId>,
        anchors: (Option<SchoolId>, Option<GenerationId>, Option<CommunityId>),
    ) -> Self {
        Self {
            consultant_id,
            student_id,
            anchors: student_id.is_none().then_some(anchors),
        }
    }
}

impl ConsultantAssignment {
    pub fn target(&self) -> AssignmentTarget {
        AssignmentTarget::new(
            self.consultant_id,
            self.student_id,
            (self.school_id, self.generation_id, self.community_id),
        )
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateConsultantAssignmentDto {
    pub consultant_id: UserId,
    /// Required for individual assignments.
    pub student_id: Option<UserId>,
    #[serde(default)]
    pub assignment_scope: ConsultantScope,
    #[validate(length(min = 1, max = 50, message = "El tipo de asignación debe tener entre 1 y 50 caracteres"))]
    pub assignment_type: Option<String>,
    pub can_view_progress: Option<bool>,
    pub can_assign_courses: Option<bool>,
    pub can_message_student: Option<bool>,
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl CreateConsultantAssignmentDto {
    /// Checks the anchors each scope needs. Returns the user-facing message
    /// for the first problem found.
    pub fn check(&self) -> Result<(), &'static str> {
        match self.assignment_scope {
            ConsultantScope::Individual => match self.student_id {
                None => return Err("student_id es obligatorio para asignaciones individuales"),
                Some(student) if student == self.consultant_id => {
                    return Err("Un consultor no puede asignarse a sí mismo");
                }
                Some(_) => {}
            },
            ConsultantScope::School => {
                if self.school_id.is_none() {
                    return Err("school_id es obligatorio para asignaciones de escuela");
                }
            }
            ConsultantScope::Generation => {
                if self.school_id.is_none() || self.generation_id.is_none() {
                    return Err(
                        "school_id y generation_id son obligatorios para asignaciones de generación",
                    );
                }
            }
            ConsultantScope::Community => {
                if self.school_id.is_none() || self.community_id.is_none() {
                    return Err(
                        "school_id y community_id son obligatorios para asignaciones de comunidad",
                    );
                }
            }
        }
        check_period(self.starts_at, self.ends_at)
    }
}

pub fn check_period(
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
) -> Result<(), &'static str> {
    match (starts_at, ends_at) {
        (Some(start), Some(end)) if end < start => {
            Err("La fecha de término no puede ser anterior a la de inicio")
        }
        _ => Ok(()),
    }
}

/// Store input for a new assignment; anchors already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConsultantAssignment {
    pub consultant_id: UserId,
    pub student_id: Option<UserId>,
    pub assignment_scope: ConsultantScope,
    pub assignment_type: String,
    pub can_view_progress: bool,
    pub can_assign_courses: bool,
    pub can_message_student: bool,
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub assigned_by: Option<UserId>,
}

impl NewConsultantAssignment {
    pub fn target(&self) -> AssignmentTarget {
        AssignmentTarget::new(
            self.consultant_id,
            self.student_id,
            (self.school_id, self.generation_id, self.community_id),
        )
    }

    /// Applies the defaults of omitted fields. Individual assignments are
    /// anchored on `student_school`; group assignments keep their own anchors.
    pub fn from_dto(
        dto: CreateConsultantAssignmentDto,
        student_school: Option<SchoolId>,
        assigned_by: UserId,
    ) -> Self {
        let individual = dto.assignment_scope == ConsultantScope::Individual;
        Self {
            consultant_id: dto.consultant_id,
            student_id: if individual { dto.student_id } else { None },
            assignment_scope: dto.assignment_scope,
            assignment_type: dto
                .assignment_type
                .unwrap_or_else(|| DEFAULT_ASSIGNMENT_TYPE.to_string()),
            can_view_progress: dto.can_view_progress.unwrap_or(true),
            can_assign_courses: dto.can_assign_courses.unwrap_or(false),
            can_message_student: dto.can_message_student.unwrap_or(true),
            school_id: if individual { student_school } else { dto.school_id },
            generation_id: if individual { None } else { dto.generation_id },
            community_id: if individual { None } else { dto.community_id },
            starts_at: dto.starts_at.unwrap_or_else(Utc::now),
            ends_at: dto.ends_at,
            assigned_by: Some(assigned_by),
        }
    }
}

/// Partial update; anchors cannot change.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateConsultantAssignmentDto {
    #[validate(length(min = 1, max = 50, message = "El tipo de asignación debe tener entre 1 y 50 caracteres"))]
    pub assignment_type: Option<String>,
    pub can_view_progress: Option<bool>,
    pub can_assign_courses: Option<bool>,
    pub can_message_student: Option<bool>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl UpdateConsultantAssignmentDto {
    pub fn apply(&self, assignment: &mut ConsultantAssignment) {
        if let Some(assignment_type) = &self.assignment_type {
            assignment.assignment_type = assignment_type.clone();
        }
        if let Some(v) = self.can_view_progress {
            assignment.can_view_progress = v;
        }
        if let Some(v) = self.can_assign_courses {
            assignment.can_assign_courses = v;
        }
        if let Some(v) = self.can_message_student {
            assignment.can_message_student = v;
        }
        if let Some(starts_at) = self.starts_at {
            assignment.starts_at = starts_at;
        }
        if let Some(ends_at) = self.ends_at {
            assignment.ends_at = Some(ends_at);
        }
        if let Some(is_active) = self.is_active {
            assignment.is_active = is_active;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ConsultantAssignmentFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub consultant_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub student_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub include_inactive: Option<bool>,
}

impl ConsultantAssignmentFilterParams {
    pub fn matches(&self, assignment: &ConsultantAssignment) -> bool {
        self.consultant_id
            .is_none_or(|id| assignment.consultant_id.into_inner() == id)
            && self
                .student_id
                .is_none_or(|id| assignment.student_id.map(UserId::into_inner) == Some(id))
            && (self.include_inactive.unwrap_or(false) || assignment.is_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(scope: ConsultantScope) -> CreateConsultantAssignmentDto {
        CreateConsultantAssignmentDto {
            consultant_id: UserId::from_u128(1),
            student_id: None,
            assignment_scope: scope,
            assignment_type: None,
            can_view_progress: None,
            can_assign_courses: None,
            can_message_student: None,
            school_id: None,
            generation_id: None,
            community_id: None,
            starts_at: None,
            ends_at: None,
        }
    }

    #[test]
    fn test_scope_anchors() {
        assert!(dto(ConsultantScope::Individual).check().is_err());
        assert!(dto(ConsultantScope::School).check().is_err());

        let mut generation = dto(ConsultantScope::Generation);
        generation.school_id = Some(SchoolId::from_u128(10));
        assert!(generation.check().is_err());
        generation.generation_id = Some(GenerationId::from_u128(20));
        assert!(generation.check().is_ok());

        let mut own = dto(ConsultantScope::Individual);
        own.student_id = Some(UserId::from_u128(1));
        assert_eq!(own.check(), Err("Un consultor no puede asignarse a sí mismo"));
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let mut school = dto(ConsultantScope::School);
        school.school_id = Some(SchoolId::from_u128(10));
        school.starts_at = Some(Utc::now());
        school.ends_at = Some(Utc::now() - chrono::Duration::days(1));
        assert!(school.check().is_err());
    }

    #[test]
    fn test_individual_defaults_and_anchor() {
        let mut individual = dto(ConsultantScope::Individual);
        individual.student_id = Some(UserId::from_u128(2));
        individual.school_id = Some(SchoolId::from_u128(99));

        let new = NewConsultantAssignment::from_dto(
            individual,
            Some(SchoolId::from_u128(10)),
            UserId::from_u128(3),
        );
        assert_eq!(new.school_id, Some(SchoolId::from_u128(10)));
        assert_eq!(new.assignment_type, DEFAULT_ASSIGNMENT_TYPE);
        assert!(new.can_view_progress && new.can_message_student && !new.can_assign_courses);
    }

    #[test]
    fn test_target_ignores_anchors_of_individual_assignments() {
        let mut student = dto(ConsultantScope::Individual);
        student.student_id = Some(UserId::from_u128(2));
        let here = NewConsultantAssignment::from_dto(
            student.clone(),
            Some(SchoolId::from_u128(10)),
            UserId::from_u128(3),
        );
        let there =
            NewConsultantAssignment::from_dto(student, Some(SchoolId::from_u128(11)), UserId::from_u128(3));
        assert_eq!(here.target(), there.target());

        let mut school = dto(ConsultantScope::School);
        school.school_id = Some(SchoolId::from_u128(10));
        let group = NewConsultantAssignment::from_dto(school, None, UserId::from_u128(3));
        assert_ne!(group.target(), here.target());
    }

    #[test]
    fn test_scope_names() {
        for scope in ConsultantScope::ALL {
            assert_eq!(scope.as_str().parse::<ConsultantScope>().unwrap(), scope);
        }
        let parsed: CreateConsultantAssignmentDto = serde_json::from_str(
            r#"{"consultant_id":"00000000-0000-0000-0000-000000000001"}"#,
        )
        .unwrap();
        assert_eq!(parsed.assignment_scope, ConsultantScope::Individual);
    }
}
