//! Schema Catalog
//!
//! The learning-platform collections the generated queries may target.
//! Rendered into prompts as context and used for structural field checks.

use std::collections::BTreeMap;

/// One queryable record collection.
#[derive(Debug, Clone)]
pub struct Collection {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [(&'static str, &'static str)],
}

/// Catalog of collections exposed to the query pipeline.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    collections: BTreeMap<&'static str, Collection>,
}

const USER_FIELDS: &[(&str, &str)] = &[
    ("id", "string"),
    ("username", "string"),
    ("displayName", "string"),
    ("role", "string: ADMIN | TEACHER | STUDENT"),
    ("email", "string"),
    ("createdAt", "datetime"),
];

const COURSE_FIELDS: &[(&str, &str)] = &[
    ("id", "string"),
    ("title", "string"),
    ("description", "string"),
    ("teacherId", "string, references user.id"),
    ("startDate", "datetime"),
    ("endDate", "datetime"),
];

const ENROLLMENT_FIELDS: &[(&str, &str)] = &[
    ("id", "string"),
    ("userId", "string, references user.id"),
    ("courseId", "string, references course.id"),
    ("roleInCourse", "string: TEACHER | STUDENT"),
    ("joinedAt", "datetime"),
];

const ASSIGNMENT_FIELDS: &[(&str, &str)] = &[
    ("id", "string"),
    ("courseId", "string, references course.id"),
    ("title", "string"),
    ("description", "string"),
    ("dueDate", "datetime"),
    ("maxScore", "number"),
];

const SUBMISSION_FIELDS: &[(&str, &str)] = &[
    ("id", "string"),
    ("assignmentId", "string, references assignment.id"),
    ("userId", "string, references user.id"),
    ("submittedAt", "datetime"),
    ("score", "number, null until graded"),
    ("status", "string: SUBMITTED | GRADED | LATE | MISSING"),
];

const ATTENDANCE_FIELDS: &[(&str, &str)] = &[
    ("id", "string"),
    ("courseId", "string, references course.id"),
    ("userId", "string, references user.id"),
    ("date", "datetime"),
    ("status", "string: PRESENT | ABSENT | EXCUSED"),
];

impl SchemaCatalog {
    pub fn new() -> Self {
        let defs = [
            Collection {
                name: "user",
                description: "Platform accounts (admins, teachers, students)",
                fields: USER_FIELDS,
            },
            Collection {
                name: "course",
                description: "Courses taught on the platform",
                fields: COURSE_FIELDS,
            },
            Collection {
                name: "enrollment",
                description: "Membership of a user in a course",
                fields: ENROLLMENT_FIELDS,
            },
            Collection {
                name: "assignment",
                description: "Assignments published within a course",
                fields: ASSIGNMENT_FIELDS,
            },
            Collection {
                name: "submission",
                description: "Student submissions for assignments",
                fields: SUBMISSION_FIELDS,
            },
            Collection {
                name: "attendance",
                description: "Per-session attendance records",
                fields: ATTENDANCE_FIELDS,
            },
        ];

        let mut collections = BTreeMap::new();
        for def in defs {
            collections.insert(def.name, def);
        }
        Self { collections }
    }

    pub fn contains(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }

    pub fn field_exists(&self, collection: &str, field: &str) -> bool {
        self.collections
            .get(collection)
            .map(|c| c.fields.iter().any(|(name, _)| *name == field))
            .unwrap_or(false)
    }

    pub fn collection_names(&self) -> Vec<&'static str> {
        self.collections.keys().copied().collect()
    }

    /// Render the schema block embedded into generation prompts.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        parts.push("AVAILABLE COLLECTIONS:".to_string());
        for collection in self.collections.values() {
            parts.push(format!("- {}: {}", collection.name, collection.description));
            for (name, ty) in collection.fields {
                parts.push(format!("    {} ({})", name, ty));
            }
        }
        parts.join("\n")
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_collections_and_fields() {
        let catalog = SchemaCatalog::new();
        assert!(catalog.contains("course"));
        assert!(catalog.contains("submission"));
        assert!(!catalog.contains("invoice"));
        assert!(catalog.field_exists("user", "displayName"));
        assert!(!catalog.field_exists("user", "password"));
    }

    #[test]
    fn test_describe_lists_every_collection() {
        let catalog = SchemaCatalog::new();
        let text = catalog.describe();
        for name in catalog.collection_names() {
            assert!(text.contains(name));
        }
    }
}
