//! End-to-end behaviour of the document engine over the in-memory store

mod common;

use blockdoc::core::Error;
use blockdoc::types::{
    BlockId, BlockOp, CommitOptions, CreateBlock, DeleteBlock, DocId, DocStatus, DocumentPatch,
    MoveBlock, Patch, PendingStatus, RenderOptions, UpdateBlock, Visibility,
};
use common::{mem_engine, new_doc, paragraph};
use serde_json::json;

fn update(doc_id: &DocId, block_id: &BlockId, text: &str, create_version: bool) -> UpdateBlock {
    UpdateBlock {
        doc_id: doc_id.clone(),
        block_id: block_id.clone(),
        payload: json!({ "text": text }),
        actor: Some("alice".into()),
        create_version,
    }
}

fn move_to(
    doc_id: &DocId,
    block_id: &BlockId,
    parent_id: Option<&BlockId>,
    after: Option<&BlockId>,
    before: Option<&BlockId>,
) -> MoveBlock {
    MoveBlock {
        doc_id: doc_id.clone(),
        block_id: block_id.clone(),
        parent_id: parent_id.cloned(),
        after: after.cloned(),
        before: before.cloned(),
        indent: None,
        actor: None,
        create_version: true,
    }
}

fn delete(doc_id: &DocId, block_id: &BlockId, create_version: bool) -> DeleteBlock {
    DeleteBlock {
        doc_id: doc_id.clone(),
        block_id: block_id.clone(),
        actor: Some("bob".into()),
        create_version,
    }
}

#[tokio::test]
async fn test_concrete_scenario() {
    let engine = mem_engine();
    let d1 = DocId::from("d1");

    let doc = new_doc(&engine, "d1").await;
    assert_eq!(doc.head, 1);
    assert_eq!(doc.published_head, 0);

    let created = paragraph(&engine, &d1, "hello").await;
    assert_eq!(engine.get_document(&d1).await.unwrap().head, 2);
    assert_eq!(created.revision.as_ref().map(|r| r.doc_ver), Some(2));

    let tree = engine.get_rendered_tree(&d1, None).await.unwrap();
    assert_eq!(tree.children().len(), 1);
    let child = tree.children()[0].as_block().unwrap();
    assert_eq!(child.block_type, "paragraph");
    assert_eq!(child.plain_text, "hello");

    let block_id = created.block.id.clone();
    engine.update_block_content(update(&d1, &block_id, "hello w", false)).await.unwrap();
    engine.update_block_content(update(&d1, &block_id, "hello world", false)).await.unwrap();
    assert_eq!(
        engine.get_pending_versions(&d1),
        PendingStatus {
            pending_count: 1,
            has_pending: true
        }
    );

    let revision = engine
        .commit_pending(&d1, CommitOptions::message("batch"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(revision.doc_ver, 3);
    assert_eq!(
        revision.patches,
        vec![Patch {
            block_id: block_id.clone(),
            from: 1,
            to: 3
        }]
    );
    assert_eq!(revision.op_summary.updated, 2);
    assert_eq!(engine.get_document(&d1).await.unwrap().head, 3);
    assert!(!engine.get_pending_versions(&d1).has_pending);

    let tree = engine.get_rendered_tree(&d1, None).await.unwrap();
    assert_eq!(tree.children()[0].as_block().unwrap().plain_text, "hello world");

    // Older versions still render their own content
    let tree = engine.get_rendered_tree(&d1, Some(2)).await.unwrap();
    assert_eq!(tree.children()[0].as_block().unwrap().plain_text, "hello");
}

#[tokio::test]
async fn test_new_document_has_root_only() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;

    let state = engine.get_doc_state(&doc.id, None).await.unwrap();
    assert_eq!(state.doc_ver, 1);
    assert_eq!(state.block_version_map.get(&doc.root_block_id), Some(&1));

    let tree = engine.get_rendered_tree(&doc.id, None).await.unwrap();
    assert_eq!(tree.block_id(), &doc.root_block_id);
    assert!(tree.children().is_empty());

    let revisions = engine.list_doc_revisions(&doc.id, None).await.unwrap();
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0].message, "init");
    assert_eq!(revisions[0].op_summary.init, 1);
}

#[tokio::test]
async fn test_commit_pending_without_edits_is_noop() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let result = engine
        .commit_pending(&doc.id, CommitOptions::message("nothing"))
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(engine.get_document(&doc.id).await.unwrap().head, 1);
}

#[tokio::test]
async fn test_state_version_is_clamped() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    paragraph(&engine, &doc.id, "a").await;

    assert_eq!(engine.get_doc_state(&doc.id, Some(0)).await.unwrap().doc_ver, 1);
    assert_eq!(engine.get_doc_state(&doc.id, Some(99)).await.unwrap().doc_ver, 2);
}

#[tokio::test]
async fn test_move_between_siblings() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let a = paragraph(&engine, &doc.id, "a").await.block.id;
    let b = paragraph(&engine, &doc.id, "b").await.block.id;
    let c = paragraph(&engine, &doc.id, "c").await.block.id;

    let moved = engine
        .move_block(move_to(&doc.id, &c, None, Some(&a), Some(&b)))
        .await
        .unwrap();
    let key_a = engine.get_block_version(&a, 1).await.unwrap().sort_key;
    let key_b = engine.get_block_version(&b, 1).await.unwrap().sort_key;
    assert!(key_a < moved.version.sort_key && moved.version.sort_key < key_b);
    assert_eq!(moved.version.ver, 2);
    assert_eq!(moved.revision.unwrap().op_summary.moved, 1);

    let tree = engine.get_rendered_tree(&doc.id, None).await.unwrap();
    let order: Vec<&BlockId> = tree.children().iter().map(|n| n.block_id()).collect();
    assert_eq!(order, vec![&a, &c, &b]);

    // A move keeps the content hash
    let diff = engine.diff_block_versions(&c, 1, 2).await.unwrap();
    assert!(diff.moved && diff.structure_changed);
    assert!(!diff.content_changed);
}

#[tokio::test]
async fn test_single_anchor_placement() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let a = paragraph(&engine, &doc.id, "a").await.block.id;
    let b = paragraph(&engine, &doc.id, "b").await.block.id;

    let first = engine
        .create_block(CreateBlock {
            before: Some(a.clone()),
            ..CreateBlock::new(doc.id.clone(), "paragraph", json!({ "text": "first" }))
        })
        .await
        .unwrap();
    let middle = engine
        .create_block(CreateBlock {
            after: Some(a.clone()),
            ..CreateBlock::new(doc.id.clone(), "paragraph", json!({ "text": "middle" }))
        })
        .await
        .unwrap();

    let tree = engine.get_rendered_tree(&doc.id, None).await.unwrap();
    let texts: Vec<&str> = tree
        .children()
        .iter()
        .map(|n| n.as_block().unwrap().plain_text.as_str())
        .collect();
    assert_eq!(texts, vec!["first", "a", "middle", "b"]);

    let key = engine
        .compute_sort_key(&doc.id, None, Some(&middle.block.id), Some(&b))
        .await
        .unwrap();
    assert!(middle.version.sort_key < key);
    assert!(first.version.sort_key.as_str() < "V");
}

#[tokio::test]
async fn test_nested_blocks_and_move_validation() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let parent = paragraph(&engine, &doc.id, "parent").await.block.id;
    let child = engine
        .create_block(CreateBlock {
            parent_id: Some(parent.clone()),
            indent: 1,
            ..CreateBlock::new(doc.id.clone(), "paragraph", json!({ "text": "child" }))
        })
        .await
        .unwrap()
        .block
        .id;

    let tree = engine.get_rendered_tree(&doc.id, None).await.unwrap();
    assert_eq!(tree.children()[0].children()[0].block_id(), &child);

    let under_child = engine
        .move_block(move_to(&doc.id, &parent, Some(&child), None, None))
        .await;
    assert!(matches!(under_child, Err(Error::InvariantViolation(_))));

    let root_move = engine
        .move_block(move_to(&doc.id, &doc.root_block_id, None, None, None))
        .await;
    assert!(matches!(root_move, Err(Error::InvariantViolation(_))));

    // Promote the child to the root level, after its old parent
    let promoted = engine
        .move_block(MoveBlock {
            indent: Some(0),
            ..move_to(&doc.id, &child, None, Some(&parent), None)
        })
        .await
        .unwrap();
    assert_eq!(promoted.version.indent, 0);
    let tree = engine.get_rendered_tree(&doc.id, None).await.unwrap();
    assert_eq!(tree.children().len(), 2);
    assert!(tree.children()[0].children().is_empty());
}

#[tokio::test]
async fn test_anchor_must_be_sibling() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let a = paragraph(&engine, &doc.id, "a").await.block.id;
    let nested = engine
        .create_block(CreateBlock {
            parent_id: Some(a.clone()),
            ..CreateBlock::new(doc.id.clone(), "paragraph", json!({}))
        })
        .await
        .unwrap()
        .block
        .id;

    let result = engine
        .create_block(CreateBlock {
            after: Some(nested),
            ..CreateBlock::new(doc.id.clone(), "paragraph", json!({}))
        })
        .await;
    assert!(matches!(result, Err(Error::InvariantViolation(_))));
}

#[tokio::test]
async fn test_delete_keeps_versions() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let block_id = paragraph(&engine, &doc.id, "keep me").await.block.id;
    paragraph(&engine, &doc.id, "other").await;
    engine
        .update_block_content(update(&doc.id, &block_id, "kept", true))
        .await
        .unwrap();

    let deleted = engine.delete_block(delete(&doc.id, &block_id, true)).await.unwrap();
    assert!(deleted.block.is_deleted);
    assert_eq!(deleted.block.deleted_by.as_deref(), Some("bob"));
    let revision = deleted.revision.unwrap();
    assert_eq!(revision.op_summary.deleted, 1);
    assert_eq!(revision.patches[0].from, revision.patches[0].to);

    assert!(engine.get_block(&block_id).await.unwrap().is_deleted);
    assert_eq!(engine.list_block_versions(&block_id).await.unwrap().len(), 2);

    let tree = engine.get_rendered_tree(&doc.id, None).await.unwrap();
    assert_eq!(tree.children().len(), 1);
    let tree = engine
        .get_rendered_tree_with(&doc.id, None, RenderOptions { include_deleted: true })
        .await
        .unwrap();
    assert_eq!(tree.children().len(), 2);
    assert!(tree.children()[0].as_block().unwrap().is_deleted);

    // Idempotent, and edits to deleted blocks are rejected
    let again = engine.delete_block(delete(&doc.id, &block_id, true)).await.unwrap();
    assert!(again.revision.is_none());
    let head = engine.get_document(&doc.id).await.unwrap().head;
    assert_eq!(head, revision.doc_ver);
    let edit = engine
        .update_block_content(update(&doc.id, &block_id, "x", true))
        .await;
    assert!(matches!(edit, Err(Error::InvariantViolation(_))));

    let root_delete = engine.delete_block(delete(&doc.id, &doc.root_block_id, true)).await;
    assert!(matches!(root_delete, Err(Error::InvariantViolation(_))));
}

#[tokio::test]
async fn test_deferred_delete_marks_block_pending() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let block_id = paragraph(&engine, &doc.id, "gone").await.block.id;

    let deleted = engine.delete_block(delete(&doc.id, &block_id, false)).await.unwrap();
    assert!(deleted.revision.is_none());
    assert_eq!(engine.get_pending_versions(&doc.id).pending_count, 1);

    let revision = engine
        .commit_pending(&doc.id, CommitOptions::message("cleanup"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        revision.patches,
        vec![Patch {
            block_id,
            from: 1,
            to: 1
        }]
    );
    assert_eq!(revision.op_summary.deleted, 1);
}

#[tokio::test]
async fn test_deferred_creates_get_distinct_keys() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let mut keys = Vec::new();
    for text in ["one", "two", "three"] {
        let created = engine
            .create_block(CreateBlock {
                create_version: false,
                ..CreateBlock::new(doc.id.clone(), "paragraph", json!({ "text": text }))
            })
            .await
            .unwrap();
        keys.push(created.version.sort_key);
    }
    assert!(keys.windows(2).all(|w| w[0] < w[1]));

    let revision = engine
        .commit_pending(&doc.id, CommitOptions::message("three blocks"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(revision.patches.len(), 3);
    assert_eq!(revision.op_summary.created, 3);
    assert!(revision.patches.iter().all(|p| p.from == 0 && p.to == 1));

    let tree = engine.get_rendered_tree(&doc.id, None).await.unwrap();
    assert_eq!(tree.children().len(), 3);
}

#[tokio::test]
async fn test_discard_pending() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let block_id = paragraph(&engine, &doc.id, "a").await.block.id;
    engine
        .update_block_content(update(&doc.id, &block_id, "b", false))
        .await
        .unwrap();

    assert_eq!(engine.pending_documents(), vec![doc.id.clone()]);
    assert_eq!(engine.discard_pending(&doc.id).await.unwrap(), 1);
    assert!(engine.pending_documents().is_empty());
    assert_eq!(engine.discard_pending(&doc.id).await.unwrap(), 0);

    let block = engine.get_block(&block_id).await.unwrap();
    assert_eq!(block.latest_ver, 1);
    let versions = engine.list_block_versions(&block_id).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].plain_text, "a");
}

#[tokio::test]
async fn test_discarded_move_stays_discarded() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let a = paragraph(&engine, &doc.id, "a").await.block.id;
    let b = paragraph(&engine, &doc.id, "b").await.block.id;

    let mut deferred = move_to(&doc.id, &b, Some(&a), None, None);
    deferred.create_version = false;
    engine.move_block(deferred).await.unwrap();
    engine.discard_pending(&doc.id).await.unwrap();

    let edited = engine
        .update_block_content(update(&doc.id, &b, "b2", true))
        .await
        .unwrap();
    assert_eq!(edited.version.ver, 2);
    assert_eq!(edited.version.parent_id, doc.root_block_id);
    let patch = &edited.revision.unwrap().patches[0];
    assert_eq!((patch.from, patch.to), (1, 2));

    let tree = engine.get_rendered_tree(&doc.id, None).await.unwrap();
    assert_eq!(tree.children().len(), 2);
    let a_node = tree.children().iter().find(|n| n.block_id() == &a).unwrap();
    assert!(a_node.children().is_empty());
    let b_node = tree.children().iter().find(|n| n.block_id() == &b).unwrap();
    assert_eq!(b_node.as_block().unwrap().plain_text, "b2");
}

#[tokio::test]
async fn test_discarded_create_and_delete_are_rolled_back() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let kept = paragraph(&engine, &doc.id, "kept").await.block.id;

    let created = engine
        .create_block(CreateBlock {
            create_version: false,
            ..CreateBlock::new(doc.id.clone(), "paragraph", json!({ "text": "draft" }))
        })
        .await
        .unwrap()
        .block
        .id;
    engine.delete_block(delete(&doc.id, &kept, false)).await.unwrap();
    assert_eq!(engine.discard_pending(&doc.id).await.unwrap(), 2);

    // The delete is undone
    assert!(!engine.get_block(&kept).await.unwrap().is_deleted);
    engine
        .update_block_content(update(&doc.id, &kept, "kept2", true))
        .await
        .unwrap();

    // The discarded block cannot be revived by a later edit
    let err = engine
        .update_block_content(update(&doc.id, &created, "again", true))
        .await
        .unwrap_err();
    assert!(err.is_invariant_violation());

    let tree = engine.get_rendered_tree(&doc.id, None).await.unwrap();
    assert_eq!(tree.children().len(), 1);
    assert_eq!(tree.children()[0].as_block().unwrap().plain_text, "kept2");
}

#[tokio::test]
async fn test_lookup_and_ownership_errors() {
    let engine = mem_engine();
    let d1 = new_doc(&engine, "d1").await;
    let d2 = new_doc(&engine, "d2").await;
    let foreign = paragraph(&engine, &d2.id, "elsewhere").await.block.id;

    let dup = engine
        .create_document(blockdoc::types::CreateDocument {
            doc_id: Some(d1.id.clone()),
            ..Default::default()
        })
        .await;
    assert!(matches!(dup, Err(Error::AlreadyExists(_))));

    let missing_doc = engine
        .create_block(CreateBlock::new("nope", "paragraph", json!({})))
        .await;
    assert!(missing_doc.unwrap_err().is_not_found());

    let missing_block = engine
        .update_block_content(update(&d1.id, &BlockId::from("ghost"), "x", true))
        .await;
    assert!(missing_block.unwrap_err().is_not_found());

    let wrong_doc = engine
        .update_block_content(update(&d1.id, &foreign, "x", true))
        .await;
    assert!(matches!(wrong_doc, Err(Error::InvariantViolation(_))));

    let foreign_parent = engine
        .create_block(CreateBlock {
            parent_id: Some(foreign.clone()),
            ..CreateBlock::new(d1.id.clone(), "paragraph", json!({}))
        })
        .await;
    assert!(matches!(foreign_parent, Err(Error::InvariantViolation(_))));

    assert!(engine.get_block_version(&foreign, 9).await.unwrap_err().is_not_found());
    assert!(engine.get_document(&DocId::from("nope")).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_publish_and_metadata() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    paragraph(&engine, &doc.id, "a").await;

    let published = engine.publish(&doc.id, None, None).await.unwrap();
    assert_eq!(published.published_head, 2);

    let too_far = engine.publish(&doc.id, Some(3), None).await;
    assert!(matches!(too_far, Err(Error::InvariantViolation(_))));
    let zero = engine.publish(&doc.id, Some(0), None).await;
    assert!(matches!(zero, Err(Error::InvalidInput(_))));

    let updated = engine
        .update_document_meta(
            &doc.id,
            DocumentPatch {
                title: Some("Renamed".into()),
                status: Some(DocStatus::Archived),
                visibility: Some(Visibility::Public),
            },
            Some("carol".into()),
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.status, DocStatus::Archived);
    assert_eq!(updated.visibility, Visibility::Public);
    assert_eq!(updated.updated_by.as_deref(), Some("carol"));
    assert_eq!(updated.head, 2);
    assert_eq!(updated.published_head, 2);
}

#[tokio::test]
async fn test_block_and_document_diffs() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let a = paragraph(&engine, &doc.id, "line one").await.block.id;
    let b = paragraph(&engine, &doc.id, "b").await.block.id;
    engine
        .update_block_content(update(&doc.id, &a, "line one\nline two", true))
        .await
        .unwrap();

    let diff = engine.diff_block_versions(&a, 1, 2).await.unwrap();
    assert!(diff.content_changed);
    assert!(!diff.moved);
    assert_eq!(
        diff.text_diff.unwrap().rendered,
        "  line one\n+ line two"
    );

    let report = engine.diff_doc_versions(&doc.id, 2, 4).await.unwrap();
    assert_eq!(report.from_ver, 2);
    assert_eq!(report.to_ver, 4);
    let ids = report.changed_ids();
    assert!(ids.contains(&a) && ids.contains(&b));
    assert_eq!(ids.len(), 2);
    let change_b = report.changes.iter().find(|c| c.block_id == b).unwrap();
    assert_eq!((change_b.from, change_b.to), (None, Some(1)));

    // Same version on both sides
    assert!(engine.diff_doc_versions(&doc.id, 3, 3).await.unwrap().changes.is_empty());
}

#[tokio::test]
async fn test_payload_extraction_on_versions() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let created = engine
        .create_block(CreateBlock::new(
            doc.id.clone(),
            "paragraph",
            json!({
                "children": [
                    { "text": "see " },
                    { "text": "other page", "docId": "d2" }
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(created.version.plain_text, "see other page");
    assert_eq!(created.version.refs.len(), 1);
    assert_eq!(created.version.refs[0].target, "d2");
    assert_eq!(created.version.hash.len(), 64);
    assert_eq!(created.revision.unwrap().message, format!("{} block {}", BlockOp::Create.as_str(), created.block.id));
}

#[tokio::test]
async fn test_revision_listing_is_newest_first() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    for i in 0..4 {
        paragraph(&engine, &doc.id, &format!("p{}", i)).await;
    }
    let revisions = engine.list_doc_revisions(&doc.id, Some(3)).await.unwrap();
    let versions: Vec<u64> = revisions.iter().map(|r| r.doc_ver).collect();
    assert_eq!(versions, vec![5, 4, 3]);
}

#[tokio::test]
async fn test_concurrent_writers_keep_versions_contiguous() {
    let engine = std::sync::Arc::new(mem_engine());
    let doc = new_doc(&engine, "d1").await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        let doc_id = doc.id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_block(CreateBlock::new(doc_id, "paragraph", json!({ "text": i.to_string() })))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(engine.get_document(&doc.id).await.unwrap().head, 17);
    let revisions = engine.list_doc_revisions(&doc.id, None).await.unwrap();
    let mut versions: Vec<u64> = revisions.iter().map(|r| r.doc_ver).collect();
    versions.sort_unstable();
    assert_eq!(versions, (1..=17).collect::<Vec<u64>>());

    let tree = engine.get_rendered_tree(&doc.id, None).await.unwrap();
    let keys: Vec<&str> = tree
        .children()
        .iter()
        .map(|n| n.as_block().unwrap().sort_key.as_str())
        .collect();
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_immediate_commit_absorbs_buffered_edit() {
    let engine = mem_engine();
    let doc = new_doc(&engine, "d1").await;
    let a = paragraph(&engine, &doc.id, "a").await.block.id;
    let b = paragraph(&engine, &doc.id, "b").await.block.id;

    engine.update_block_content(update(&doc.id, &a, "a2", false)).await.unwrap();
    engine.update_block_content(update(&doc.id, &b, "b2", false)).await.unwrap();
    let moved = engine
        .move_block(move_to(&doc.id, &a, None, Some(&b), None))
        .await
        .unwrap();

    let revision = moved.revision.unwrap();
    assert_eq!(revision.patches, vec![Patch { block_id: a.clone(), from: 1, to: 3 }]);
    assert_eq!(revision.op_summary.updated, 1);
    assert_eq!(revision.op_summary.moved, 1);
    assert_eq!(
        engine.get_pending_versions(&doc.id),
        PendingStatus { pending_count: 1, has_pending: true }
    );

    // Flushing the other block must not roll `a` back
    engine
        .commit_pending(&doc.id, CommitOptions::message("flush"))
        .await
        .unwrap();
    let state = engine.get_doc_state(&doc.id, None).await.unwrap();
    assert_eq!(state.block_version_map[&a], 3);
    assert_eq!(state.block_version_map[&b], 2);
}
