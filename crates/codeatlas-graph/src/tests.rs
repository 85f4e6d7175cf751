// ABOUTME: End-to-end scenarios for the incremental indexing cycle using the
// ABOUTME: in-memory store adapters and on-disk temp workspaces.

use crate::cascade::{CallerCountCache, CascadeQueueBuilder};
use crate::memory::{InMemoryCacheStore, InMemoryGraphStore, InMemoryVectorIndex};
use crate::pipeline::IndexingPipeline;
use crate::repair::EdgeRepairer;
use codeatlas_core::{
    CascadeConfig, ChangeType, ChangedFile, Edge, EdgeKind, Entity, EntityChurn, EntityId,
    EntityKind, GraphStore, IndexingConfig, Scope, UnresolvedRef,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn scope() -> Scope {
    Scope::new("org-1", "repo-1")
}

fn pipeline(graph: Arc<InMemoryGraphStore>) -> IndexingPipeline {
    IndexingPipeline::new(
        graph,
        Arc::new(InMemoryVectorIndex::new()),
        Arc::new(InMemoryCacheStore::new()),
        IndexingConfig::default(),
    )
}

fn write(workspace: &Path, rel: &str, content: &str) {
    let path = workspace.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

async fn assert_no_dangling_edges(graph: &InMemoryGraphStore, scope: &Scope) {
    for edge in graph.all_edges(scope).await.unwrap() {
        assert!(
            graph.get_entity(scope, &edge.from_id).await.unwrap().is_some(),
            "edge {:?} has dangling from_id",
            edge
        );
        assert!(
            graph.get_entity(scope, &edge.to_id).await.unwrap().is_some(),
            "edge {:?} has dangling to_id",
            edge
        );
    }
}

async fn exported_id(graph: &InMemoryGraphStore, scope: &Scope, name: &str) -> EntityId {
    let matches = graph.find_exported_by_name(scope, name).await.unwrap();
    assert_eq!(matches.len(), 1, "expected exactly one exported {}", name);
    matches[0].id.clone()
}

#[tokio::test]
async fn rename_is_delete_create_and_edge_is_rerouted() {
    let dir = TempDir::new().unwrap();
    let scope = scope();
    let graph = Arc::new(InMemoryGraphStore::new());
    let pipeline = pipeline(graph.clone());

    write(
        dir.path(),
        "a.ts",
        "import { bar } from './b';\nexport function foo(x: number) { return bar(x); }\n",
    );
    write(dir.path(), "b.ts", "export function bar(x: number) { return x; }\n");
    pipeline
        .run_with_changes(
            &scope,
            dir.path(),
            &[
                ChangedFile::new("a.ts", ChangeType::Added),
                ChangedFile::new("b.ts", ChangeType::Added),
            ],
        )
        .await
        .unwrap();

    let foo_id = exported_id(&graph, &scope, "foo").await;
    let bar_id = exported_id(&graph, &scope, "bar").await;
    let edges = graph.all_edges(&scope).await.unwrap();
    assert!(
        edges.contains(&Edge::new(foo_id.clone(), bar_id.clone(), EdgeKind::Calls)),
        "cross-file call must be resolved by the repairer"
    );

    // Rename bar -> baz in b.ts only.
    write(dir.path(), "b.ts", "export function baz(x: number) { return x; }\n");
    pipeline
        .run_with_changes(
            &scope,
            dir.path(),
            &[ChangedFile::new("b.ts", ChangeType::Modified)],
        )
        .await
        .unwrap();

    assert!(
        graph.get_entity(&scope, &bar_id).await.unwrap().is_none(),
        "old identity must be deleted"
    );
    let baz_id = exported_id(&graph, &scope, "baz").await;
    assert_ne!(bar_id, baz_id);
    let edges = graph.all_edges(&scope).await.unwrap();
    assert!(
        edges.contains(&Edge::new(foo_id.clone(), baz_id, EdgeKind::Calls)),
        "call edge must be re-pointed to the successor"
    );
    assert!(
        !edges.iter().any(|e| e.from_id == bar_id || e.to_id == bar_id),
        "no edge may reference the deleted id"
    );
    assert_no_dangling_edges(&graph, &scope).await;
}

#[tokio::test]
async fn identity_is_stable_across_body_only_changes() {
    let dir = TempDir::new().unwrap();
    let scope = scope();
    let graph = Arc::new(InMemoryGraphStore::new());
    let pipeline = pipeline(graph.clone());

    write(dir.path(), "a.ts", "export function foo(x: number) { return 1; }\n");
    pipeline
        .run_with_changes(
            &scope,
            dir.path(),
            &[ChangedFile::new("a.ts", ChangeType::Added)],
        )
        .await
        .unwrap();
    let id_before = exported_id(&graph, &scope, "foo").await;

    write(dir.path(), "a.ts", "export function foo(x: number) { return 42; }\n");
    pipeline
        .run_with_changes(
            &scope,
            dir.path(),
            &[ChangedFile::new("a.ts", ChangeType::Modified)],
        )
        .await
        .unwrap();
    assert_eq!(exported_id(&graph, &scope, "foo").await, id_before);
}

#[tokio::test]
async fn reindex_twice_has_zero_net_growth() {
    let dir = TempDir::new().unwrap();
    let scope = scope();
    let graph = Arc::new(InMemoryGraphStore::new());
    let pipeline = pipeline(graph.clone());
    write(
        dir.path(),
        "a.ts",
        "export function foo(x: number) { return helper(x); }\nfunction helper(x: number) { return x; }\n",
    );

    let changes = [ChangedFile::new("a.ts", ChangeType::Added)];
    let first = pipeline
        .run_with_changes(&scope, dir.path(), &changes)
        .await
        .unwrap();
    let entities_after_first = graph.entity_count(&scope);
    let edges_after_first = graph.edge_count(&scope);

    let changes = [ChangedFile::new("a.ts", ChangeType::Modified)];
    let second = pipeline
        .run_with_changes(&scope, dir.path(), &changes)
        .await
        .unwrap();
    assert_eq!(first.entities_written, second.entities_written);
    assert_eq!(graph.entity_count(&scope), entities_after_first);
    assert_eq!(graph.edge_count(&scope), edges_after_first);
    assert_no_dangling_edges(&graph, &scope).await;
}

#[tokio::test]
async fn oversized_file_quarantines_then_heals() {
    let dir = TempDir::new().unwrap();
    let scope = scope();
    let graph = Arc::new(InMemoryGraphStore::new());
    let pipeline = pipeline(graph.clone());

    let big_body = format!("// {}\n", "x".repeat(2 * 1024 * 1024));
    write(dir.path(), "big.ts", &big_body);
    let summary = pipeline
        .run_with_changes(
            &scope,
            dir.path(),
            &[ChangedFile::new("big.ts", ChangeType::Added)],
        )
        .await
        .unwrap();
    assert_eq!(summary.files_quarantined, 1);

    let placeholder_id = codeatlas_core::quarantine_id(&scope.repository_id, "big.ts");
    let placeholder = graph
        .get_entity(&scope, &placeholder_id)
        .await
        .unwrap()
        .expect("placeholder must be written");
    assert_eq!(placeholder.kind, EntityKind::QuarantinePlaceholder);
    assert_eq!(placeholder.doc.as_deref(), Some("oversized"));

    // Quarantining again must not create a second placeholder.
    let before = graph.entity_count(&scope);
    pipeline
        .run_with_changes(
            &scope,
            dir.path(),
            &[ChangedFile::new("big.ts", ChangeType::Modified)],
        )
        .await
        .unwrap();
    assert_eq!(graph.entity_count(&scope), before);

    // Shrink below the ceiling; the real entity set replaces the placeholder.
    write(dir.path(), "big.ts", "export function tiny() { return 1; }\n");
    let summary = pipeline
        .run_with_changes(
            &scope,
            dir.path(),
            &[ChangedFile::new("big.ts", ChangeType::Modified)],
        )
        .await
        .unwrap();
    assert_eq!(summary.files_quarantined, 0);
    assert!(graph
        .get_entity(&scope, &placeholder_id)
        .await
        .unwrap()
        .is_none());
    exported_id(&graph, &scope, "tiny").await;
    assert_no_dangling_edges(&graph, &scope).await;
}

#[tokio::test]
async fn removing_a_quarantined_file_drops_its_placeholder() {
    let dir = TempDir::new().unwrap();
    let scope = scope();
    let graph = Arc::new(InMemoryGraphStore::new());
    let pipeline = pipeline(graph.clone());

    let big_body = format!("// {}\n", "x".repeat(2 * 1024 * 1024));
    write(dir.path(), "big.ts", &big_body);
    pipeline
        .run_with_changes(
            &scope,
            dir.path(),
            &[ChangedFile::new("big.ts", ChangeType::Added)],
        )
        .await
        .unwrap();

    let placeholder_id = codeatlas_core::quarantine_id(&scope.repository_id, "big.ts");
    assert!(graph
        .get_entity(&scope, &placeholder_id)
        .await
        .unwrap()
        .is_some());

    // The file disappears from the repository while still quarantined; the
    // placeholder must be reconciled away with it, not kept alive.
    std::fs::remove_file(dir.path().join("big.ts")).unwrap();
    pipeline
        .run_with_changes(
            &scope,
            dir.path(),
            &[ChangedFile::new("big.ts", ChangeType::Removed)],
        )
        .await
        .unwrap();
    assert!(graph
        .get_entity(&scope, &placeholder_id)
        .await
        .unwrap()
        .is_none());
    assert_no_dangling_edges(&graph, &scope).await;
}

#[tokio::test]
async fn removed_file_takes_its_entities_and_edges_along() {
    let dir = TempDir::new().unwrap();
    let scope = scope();
    let graph = Arc::new(InMemoryGraphStore::new());
    let pipeline = pipeline(graph.clone());

    write(
        dir.path(),
        "a.ts",
        "export function foo(x: number) { return bar(x); }\n",
    );
    write(dir.path(), "b.ts", "export function bar(x: number) { return x; }\n");
    pipeline
        .run_with_changes(
            &scope,
            dir.path(),
            &[
                ChangedFile::new("a.ts", ChangeType::Added),
                ChangedFile::new("b.ts", ChangeType::Added),
            ],
        )
        .await
        .unwrap();
    let bar_id = exported_id(&graph, &scope, "bar").await;

    fs::remove_file(dir.path().join("b.ts")).unwrap();
    pipeline
        .run_with_changes(
            &scope,
            dir.path(),
            &[ChangedFile::new("b.ts", ChangeType::Removed)],
        )
        .await
        .unwrap();

    assert!(graph.get_entity(&scope, &bar_id).await.unwrap().is_none());
    assert!(graph
        .get_entities_by_file(&scope, "b.ts")
        .await
        .unwrap()
        .is_empty());
    assert_no_dangling_edges(&graph, &scope).await;
}

#[tokio::test]
async fn cascade_queue_plateaus_for_hub_entities() {
    let scope = scope();
    let config = CascadeConfig::default();

    async fn cascade_size(scope: &Scope, config: &CascadeConfig, caller_count: usize) -> usize {
        let graph = InMemoryGraphStore::new();
        let hub = Entity::new(scope, EntityKind::Function, "hub", "hub.ts").with_exported(true);
        let hub_id = hub.id.clone();
        let mut entities = vec![hub];
        let mut edges = Vec::new();
        for i in 0..caller_count {
            let caller = Entity::new(
                scope,
                EntityKind::Function,
                format!("caller_{}", i),
                format!("callers/c{}.ts", i),
            );
            edges.push(Edge::new(caller.id.clone(), hub_id.clone(), EdgeKind::Calls));
            entities.push(caller);
        }
        graph.bulk_upsert_entities(scope, entities).await.unwrap();
        graph.bulk_upsert_edges(scope, edges).await.unwrap();

        let builder =
            CascadeQueueBuilder::new(Arc::new(CallerCountCache::new()), config.clone());
        let queues = builder
            .build(scope, &graph, std::slice::from_ref(&hub_id))
            .await
            .unwrap();
        queues.cascade.len()
    }

    let small = cascade_size(&scope, &config, 5).await;
    let huge = cascade_size(&scope, &config, 5_000).await;
    assert_eq!(small, 5, "below the cutoff every caller is cascaded");
    assert!(
        huge <= config.hub_caller_cutoff,
        "hub expansion must plateau, got {} for 5000 callers",
        huge
    );
}

#[tokio::test]
async fn empty_change_set_is_a_skip() {
    let dir = TempDir::new().unwrap();
    let scope = scope();
    let graph = Arc::new(InMemoryGraphStore::new());
    let summary = pipeline(graph.clone())
        .run_with_changes(&scope, dir.path(), &[])
        .await
        .unwrap();
    assert_eq!(summary.entities_written, 0);
    assert_eq!(summary.embeddings_updated, 0);
    assert_eq!(graph.entity_count(&scope), 0);
}

#[tokio::test]
async fn ambiguous_exported_name_is_left_unresolved() {
    let scope = scope();
    let graph = InMemoryGraphStore::new();
    let from = Entity::new(&scope, EntityKind::Function, "caller", "a.ts").with_exported(true);
    let dup_one = Entity::new(&scope, EntityKind::Function, "helper", "b.ts").with_exported(true);
    let dup_two = Entity::new(&scope, EntityKind::Function, "helper", "c.ts").with_exported(true);
    let from_id = from.id.clone();
    graph
        .bulk_upsert_entities(&scope, vec![from, dup_one, dup_two])
        .await
        .unwrap();
    graph
        .park_unresolved_refs(
            &scope,
            vec![UnresolvedRef {
                from_id,
                target_name: "helper".into(),
                kind: EdgeKind::Calls,
            }],
        )
        .await
        .unwrap();

    let report = EdgeRepairer::new()
        .repair(&scope, &graph, &EntityChurn::default())
        .await
        .unwrap();
    assert_eq!(report.edges_created, 0, "ties must never be guessed");
    assert!(graph.all_edges(&scope).await.unwrap().is_empty());
    // The reference stays parked for a later cycle rather than vanishing.
    assert_eq!(graph.take_unresolved_refs(&scope).await.unwrap().len(), 1);
}

#[tokio::test]
async fn git_diff_drives_a_full_cycle() {
    use git2::{IndexAddOption, Repository, Signature};

    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let commit = |msg: &str| {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("test", "test@example.com").unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .and_then(|oid| repo.find_commit(oid).ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &parent_refs)
            .unwrap()
    };

    write(dir.path(), "a.ts", "export function foo() { return 1; }\n");
    let first = commit("initial");
    write(dir.path(), "a.ts", "export function foo() { return 2; }\n");
    write(dir.path(), "b.ts", "export function bar() { return foo(); }\n");
    let second = commit("changes");

    let scope = scope();
    let graph = Arc::new(InMemoryGraphStore::new());
    let summary = pipeline(graph.clone())
        .run(&scope, dir.path(), &first.to_string(), &second.to_string())
        .await
        .unwrap();
    assert!(summary.full_rescan_required.is_none());
    assert_eq!(summary.files_changed, 2);
    assert!(graph.entity_count(&scope) >= 4);

    // Unresolvable before-revision surfaces the rescan signal.
    let summary = pipeline(graph)
        .run(
            &scope,
            dir.path(),
            "0000000000000000000000000000000000000000",
            &second.to_string(),
        )
        .await
        .unwrap();
    assert!(summary.full_rescan_required.is_some());
}
