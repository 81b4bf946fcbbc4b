//! Collection tasks: endpoints, extraction strategy, expected headers and
//! target schema for each dataset.

pub mod headlines;
pub mod listings;
pub mod psx;
pub mod universities;

use crate::errors::{CollectError, SchemaError};
use crate::models::RecordSet;
use crate::pipeline::{Collector, EndpointPipeline};
use crate::schema::{Identity, Schema};

/// A fully configured collection run.
#[derive(Debug, Clone)]
pub struct TaskPlan {
    pub name: &'static str,
    pub endpoints: Vec<String>,
    pub target_count: usize,
    pub pipeline: EndpointPipeline,
}

impl TaskPlan {
    pub async fn collect(&self, collector: &Collector) -> Result<RecordSet, CollectError> {
        collector
            .collect(&self.endpoints, self.target_count, &self.pipeline)
            .await
    }

    pub fn columns(&self) -> Vec<String> {
        self.pipeline.schema.columns()
    }
}

fn endpoints(urls: &[&str]) -> Vec<String> {
    urls.iter().map(|u| u.to_string()).collect()
}

/// The identity column must be part of the schema.
fn check_identity(schema: &Schema, identity: &Identity) -> Result<(), SchemaError> {
    match identity.column() {
        Some(c) if !schema.has_column(c) => Err(SchemaError::UnknownIdentityColumn(c.to_string())),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;

    #[test]
    fn test_identity_must_be_in_schema() {
        let schema = Schema::new(vec![FieldSpec::text("headline")], vec![]).unwrap();
        let err = check_identity(&schema, &Identity::Url("url".into())).unwrap_err();
        assert_eq!(err, SchemaError::UnknownIdentityColumn("url".into()));
        check_identity(&schema, &Identity::None).unwrap();
    }

    #[test]
    fn test_every_plan_builds() {
        for plan in [
            headlines::plan(30).unwrap(),
            psx::indices_plan(500).unwrap(),
            psx::mainboard_plan(500).unwrap(),
            universities::plan(50).unwrap(),
            listings::plan("iphone 15", 20).unwrap(),
        ] {
            assert!(!plan.endpoints.is_empty(), "{}", plan.name);
            assert!(plan.columns().len() >= 4, "{}", plan.name);
        }
    }
}
