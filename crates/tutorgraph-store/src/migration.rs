//! Backend-to-backend data migration
//!
//! Copies a full graph from one `GraphStore` to another through the
//! export/batch-ingest surface, with a JSON backup written before any
//! target write, an optional dry run, and a post-copy count
//! verification. The copy tolerates per-chunk failures; copying some but
//! not all records is reported as `Partial`, distinct from total
//! failure. Node ids are reassigned by the target on ingest, so
//! relationship endpoints are re-pointed through an old-to-new id map.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use tutorgraph_core::recovery::{self, FailureContext};
use tutorgraph_core::types::{GraphSnapshot, GraphStats, NodeInput, RelationshipInput};
use tutorgraph_core::{GraphError, GraphResult, GraphStore};

use crate::BATCH_CHUNK_SIZE;

/// Knobs for one migration run
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Report what would be copied without writing to the target
    pub dry_run: bool,
    /// Where the pre-migration backup lands; temp dir when unset
    pub backup_dir: Option<PathBuf>,
    /// Compare source and target counts after the copy
    pub verify: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup_dir: None,
            verify: true,
        }
    }
}

/// Terminal state of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationStatus {
    /// Source held no data; nothing to do
    NoData,
    /// Counts reported, no target writes performed
    DryRun,
    /// Every record copied
    Completed,
    /// Some but not all records copied; backup retained for recovery
    Partial,
    /// Nothing copied; backup retained for recovery
    Failed,
}

/// What a migration run did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub status: MigrationStatus,
    pub nodes_migrated: u64,
    pub relationships_migrated: u64,
    /// Records that could not be copied (failed chunks, dangling edges)
    pub failed_records: u64,
    pub backup_path: Option<PathBuf>,
    pub verification: Option<VerificationReport>,
}

/// A single discrepancy found during verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationIssue {
    pub kind: IssueKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    NodeCountMismatch,
    RelationshipCountMismatch,
    MaterialMismatch,
}

/// Outcome of comparing source and target after a copy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub passed: bool,
    pub issues: Vec<VerificationIssue>,
}

struct CopyOutcome {
    nodes_copied: u64,
    relationships_copied: u64,
    failed_records: u64,
}

/// Copies graph data between two storage backends
pub struct MigrationService {
    source: Arc<dyn GraphStore>,
    target: Arc<dyn GraphStore>,
}

impl MigrationService {
    pub fn new(source: Arc<dyn GraphStore>, target: Arc<dyn GraphStore>) -> Self {
        Self { source, target }
    }

    /// Run a migration per the given options
    pub async fn migrate(&self, options: &MigrationOptions) -> GraphResult<MigrationReport> {
        let stats = self.source.stats().await?;
        if stats.is_empty() {
            info!("Source graph is empty, nothing to migrate");
            return Ok(MigrationReport {
                status: MigrationStatus::NoData,
                nodes_migrated: 0,
                relationships_migrated: 0,
                failed_records: 0,
                backup_path: None,
                verification: None,
            });
        }

        let snapshot = self.source.export_graph().await?;
        let backup_path = self.write_backup(&snapshot, options)?;
        info!(
            nodes = snapshot.nodes.len(),
            relationships = snapshot.relationships.len(),
            backup = ?backup_path,
            "Starting migration"
        );

        if options.dry_run {
            return Ok(MigrationReport {
                status: MigrationStatus::DryRun,
                nodes_migrated: snapshot.nodes.len() as u64,
                relationships_migrated: snapshot.relationships.len() as u64,
                failed_records: 0,
                backup_path: Some(backup_path),
                verification: None,
            });
        }

        let outcome = self.copy(&snapshot).await;
        let copied = outcome.nodes_copied + outcome.relationships_copied;
        let status = status_for(copied, outcome.failed_records);
        if status != MigrationStatus::Completed {
            warn!(
                copied,
                failed = outcome.failed_records,
                backup = ?backup_path,
                "Migration did not copy everything, backup retained"
            );
        }

        let verification = if options.verify {
            let source_stats = self.source.stats().await?;
            let target_stats = self.target.stats().await?;
            Some(verify_counts(&source_stats, &target_stats))
        } else {
            None
        };

        info!(
            nodes_migrated = outcome.nodes_copied,
            relationships_migrated = outcome.relationships_copied,
            ?status,
            "Migration finished"
        );
        Ok(MigrationReport {
            status,
            nodes_migrated: outcome.nodes_copied,
            relationships_migrated: outcome.relationships_copied,
            failed_records: outcome.failed_records,
            backup_path: Some(backup_path),
            verification,
        })
    }

    /// Serialize the snapshot to a timestamped JSON file before any write
    fn write_backup(
        &self,
        snapshot: &GraphSnapshot,
        options: &MigrationOptions,
    ) -> GraphResult<PathBuf> {
        let dir = options
            .backup_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&dir)
            .map_err(|e| GraphError::Migration(format!("failed to create backup dir: {e}")))?;

        let path = dir.join(format!(
            "tutorgraph-backup-{}.json",
            Utc::now().format("%Y%m%d%H%M%S%3f")
        ));
        let payload = serde_json::to_vec_pretty(snapshot)?;
        std::fs::write(&path, payload)
            .map_err(|e| GraphError::Migration(format!("failed to write backup: {e}")))?;
        info!(path = ?path, "Backup written");
        Ok(path)
    }

    /// Copy nodes chunk by chunk, then relationships one by one
    ///
    /// A failed chunk is skipped, not fatal; the remaining chunks still
    /// get their chance. Relationships whose endpoints did not make it
    /// across are counted as failed records.
    async fn copy(&self, snapshot: &GraphSnapshot) -> CopyOutcome {
        let mut outcome = CopyOutcome {
            nodes_copied: 0,
            relationships_copied: 0,
            failed_records: 0,
        };

        // Target assigns fresh node ids; map old to new by ingest order
        let mut id_map: HashMap<&str, String> = HashMap::new();

        for chunk in snapshot.nodes.chunks(BATCH_CHUNK_SIZE) {
            let inputs: Vec<NodeInput> = chunk
                .iter()
                .map(|node| NodeInput {
                    course_id: node.course_id.clone(),
                    material_id: node.material_id.clone(),
                    content: node.content.clone(),
                    chunk_index: node.chunk_index,
                    metadata: node.metadata.clone(),
                    embedding: node.embedding.clone(),
                })
                .collect();

            match self.target.store_batch_nodes(inputs).await {
                Ok(stored) => {
                    // Stored nodes are in input order, so a partial chunk
                    // still maps its durable prefix
                    for (old, new) in chunk.iter().zip(&stored.nodes) {
                        id_map.insert(old.id.as_str(), new.id.clone());
                    }
                    outcome.nodes_copied += stored.nodes.len() as u64;
                    if stored.failed > 0 {
                        warn!(
                            failed = stored.failed,
                            chunk_len = chunk.len(),
                            "Node chunk persisted only partially"
                        );
                        outcome.failed_records += stored.failed as u64;
                    }
                }
                Err(err) => {
                    recovery::classify(FailureContext::Migration, &err);
                    warn!(%err, chunk_len = chunk.len(), "Node chunk failed to copy");
                    outcome.failed_records += chunk.len() as u64;
                }
            }
        }

        for relationship in &snapshot.relationships {
            let (Some(source), Some(target)) = (
                id_map.get(relationship.source_node_id.as_str()),
                id_map.get(relationship.target_node_id.as_str()),
            ) else {
                warn!(
                    relationship_id = %relationship.id,
                    "Skipping relationship with unmapped endpoint"
                );
                outcome.failed_records += 1;
                continue;
            };
            let input = RelationshipInput {
                source_node_id: source.clone(),
                target_node_id: target.clone(),
                relationship_type: relationship.relationship_type.clone(),
                weight: Some(relationship.weight),
                metadata: relationship.metadata.clone(),
            };
            match self.target.store_relationship(input).await {
                Ok(_) => outcome.relationships_copied += 1,
                Err(err) => {
                    recovery::classify(FailureContext::Migration, &err);
                    warn!(%err, relationship_id = %relationship.id, "Relationship failed to copy");
                    outcome.failed_records += 1;
                }
            }
        }

        outcome
    }
}

/// Map copy counts to a terminal status
fn status_for(copied: u64, failed: u64) -> MigrationStatus {
    if failed == 0 {
        MigrationStatus::Completed
    } else if copied > 0 {
        MigrationStatus::Partial
    } else {
        MigrationStatus::Failed
    }
}

/// Compare post-copy counts between source and target
pub fn verify_counts(source: &GraphStats, target: &GraphStats) -> VerificationReport {
    let mut issues = Vec::new();

    if source.node_count != target.node_count {
        issues.push(VerificationIssue {
            kind: IssueKind::NodeCountMismatch,
            detail: format!(
                "source has {} nodes, target has {}",
                source.node_count, target.node_count
            ),
        });
    }
    if source.relationship_count != target.relationship_count {
        issues.push(VerificationIssue {
            kind: IssueKind::RelationshipCountMismatch,
            detail: format!(
                "source has {} relationships, target has {}",
                source.relationship_count, target.relationship_count
            ),
        });
    }
    for (material_id, count) in &source.materials {
        let target_count = target.materials.get(material_id).copied().unwrap_or(0);
        if *count != target_count {
            issues.push(VerificationIssue {
                kind: IssueKind::MaterialMismatch,
                detail: format!(
                    "material {material_id}: source has {count} nodes, target has {target_count}"
                ),
            });
        }
    }

    VerificationReport {
        passed: issues.is_empty(),
        issues,
    }
}
