//! End-to-end workflow engine tests against a real database.

use sqlx::PgPool;

use docuflow_core::workflow::{
    ActionConfig, AssignmentConfig, RemovalConfig, TriggerType, WebhookActionConfig,
};
use docuflow_db::models::document::CreateDocument;
use docuflow_db::models::workflow::{CreateTrigger, CreateWorkflow};
use docuflow_db::repositories::{
    CorrespondentRepo, DocumentRepo, DocumentTypeRepo, StoragePathRepo, TagRepo, UserRepo,
    WorkflowRepo, WorkflowRunRepo,
};
use docuflow_engine::{sweep_once, WorkflowEngine};

async fn workflow(pool: &PgPool, name: &str, order: i32) -> i64 {
    WorkflowRepo::create(
        pool,
        &CreateWorkflow {
            name: name.to_string(),
            sort_order: Some(order),
            enabled: None,
        },
    )
    .await
    .unwrap()
    .id
}

async fn add_trigger(pool: &PgPool, workflow_id: i64, trigger: CreateTrigger) -> i64 {
    let row = WorkflowRepo::create_trigger(pool, &trigger).await.unwrap();
    WorkflowRepo::attach_trigger(pool, workflow_id, row.id)
        .await
        .unwrap();
    row.id
}

async fn add_action(pool: &PgPool, workflow_id: i64, config: ActionConfig) -> i64 {
    let row = WorkflowRepo::create_action(pool, &config).await.unwrap();
    WorkflowRepo::attach_action(pool, workflow_id, row.id)
        .await
        .unwrap();
    row.id
}

async fn consumed_document(pool: &PgPool, filename: &str) -> i64 {
    DocumentRepo::create(
        pool,
        &CreateDocument {
            title: filename.to_string(),
            original_filename: Some(filename.to_string()),
            source: Some("consume_folder".into()),
            content: "lorem ipsum".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id
}

#[sqlx::test(migrations = "../../migrations")]
async fn consumption_trigger_assigns_metadata(pool: PgPool) {
    let correspondent = CorrespondentRepo::create(&pool, "ACME").await.unwrap();
    let owner = UserRepo::create(&pool, "archivist").await.unwrap();
    let t1 = TagRepo::create(&pool, "inbox").await.unwrap();
    let t2 = TagRepo::create(&pool, "scanned").await.unwrap();
    let t3 = TagRepo::create(&pool, "todo").await.unwrap();

    let wf = workflow(&pool, "label-simple", 0).await;
    let mut trigger = CreateTrigger::new(TriggerType::Consumption);
    trigger.filter_filename = Some("*simple*".into());
    add_trigger(&pool, wf, trigger).await;
    add_action(
        &pool,
        wf,
        ActionConfig::Assignment(AssignmentConfig {
            correspondent: Some(correspondent),
            owner: Some(owner),
            tags: vec![t1, t2, t3],
            ..Default::default()
        }),
    )
    .await;

    let engine = WorkflowEngine::new(pool.clone());

    // Matching document gets all three assignments.
    let matching = consumed_document(&pool, "simple.pdf").await;
    let result = engine
        .run_workflows(TriggerType::Consumption, matching)
        .await
        .unwrap();
    assert_eq!(result.matched_workflows, vec![wf]);
    assert!(result.applied);

    let snapshot = DocumentRepo::snapshot(&pool, matching).await.unwrap().unwrap();
    assert_eq!(snapshot.correspondent.as_ref().unwrap().id, correspondent);
    assert_eq!(snapshot.owner.as_ref().unwrap().id, owner);
    assert_eq!(snapshot.tags, [t1, t2, t3].into());

    // Non-matching document is left untouched.
    let other = consumed_document(&pool, "other.pdf").await;
    let result = engine
        .run_workflows(TriggerType::Consumption, other)
        .await
        .unwrap();
    assert!(result.matched_workflows.is_empty());
    assert!(!result.applied);

    let snapshot = DocumentRepo::snapshot(&pool, other).await.unwrap().unwrap();
    assert!(snapshot.correspondent.is_none());
    assert!(snapshot.owner.is_none());
    assert!(snapshot.tags.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn two_workflows_merge_into_one_change_set(pool: PgPool) {
    let doc_type = DocumentTypeRepo::create(&pool, "Invoice").await.unwrap();
    let correspondent = CorrespondentRepo::create(&pool, "City Gas").await.unwrap();
    let storage_path = StoragePathRepo::create(&pool, "utilities", "archive/utilities")
        .await
        .unwrap();
    let t1 = TagRepo::create(&pool, "typed").await.unwrap();
    let t3 = TagRepo::create(&pool, "filed").await.unwrap();

    let w1 = workflow(&pool, "classify", 0).await;
    add_trigger(&pool, w1, CreateTrigger::new(TriggerType::Consumption)).await;
    add_action(
        &pool,
        w1,
        ActionConfig::Assignment(AssignmentConfig {
            document_type: Some(doc_type),
            tags: vec![t1],
            ..Default::default()
        }),
    )
    .await;

    let w2 = workflow(&pool, "file-away", 1).await;
    add_trigger(&pool, w2, CreateTrigger::new(TriggerType::Consumption)).await;
    add_action(
        &pool,
        w2,
        ActionConfig::Assignment(AssignmentConfig {
            correspondent: Some(correspondent),
            storage_path: Some(storage_path),
            tags: vec![t3],
            ..Default::default()
        }),
    )
    .await;

    let engine = WorkflowEngine::new(pool.clone());
    let document = consumed_document(&pool, "gas.pdf").await;
    let result = engine
        .run_workflows(TriggerType::Consumption, document)
        .await
        .unwrap();
    assert_eq!(result.matched_workflows, vec![w1, w2]);

    let snapshot = DocumentRepo::snapshot(&pool, document).await.unwrap().unwrap();
    assert_eq!(snapshot.document_type.as_ref().unwrap().id, doc_type);
    assert_eq!(snapshot.correspondent.as_ref().unwrap().id, correspondent);
    assert_eq!(snapshot.storage_path.as_ref().unwrap().id, storage_path);
    assert_eq!(snapshot.tags, [t1, t3].into());
}

#[sqlx::test(migrations = "../../migrations")]
async fn removal_nets_out_after_assignment(pool: PgPool) {
    let t1 = TagRepo::create(&pool, "tag-one").await.unwrap();
    let t2 = TagRepo::create(&pool, "tag-two").await.unwrap();

    let w1 = workflow(&pool, "tagger", 0).await;
    add_trigger(&pool, w1, CreateTrigger::new(TriggerType::Consumption)).await;
    add_action(
        &pool,
        w1,
        ActionConfig::Assignment(AssignmentConfig {
            tags: vec![t1, t2],
            ..Default::default()
        }),
    )
    .await;

    let w2 = workflow(&pool, "pruner", 1).await;
    add_trigger(&pool, w2, CreateTrigger::new(TriggerType::Consumption)).await;
    add_action(
        &pool,
        w2,
        ActionConfig::Removal(RemovalConfig {
            tags: vec![t1],
            ..Default::default()
        }),
    )
    .await;

    let engine = WorkflowEngine::new(pool.clone());
    let document = consumed_document(&pool, "doc.pdf").await;
    engine
        .run_workflows(TriggerType::Consumption, document)
        .await
        .unwrap();

    let snapshot = DocumentRepo::snapshot(&pool, document).await.unwrap().unwrap();
    assert_eq!(snapshot.tags, [t2].into());
}

#[sqlx::test(migrations = "../../migrations")]
async fn scheduled_workflow_fires_once(pool: PgPool) {
    let tag = TagRepo::create(&pool, "retention").await.unwrap();

    let wf = workflow(&pool, "retention-sweep", 0).await;
    // Offset 0 against `created`: due as soon as the document exists.
    add_trigger(&pool, wf, CreateTrigger::new(TriggerType::Scheduled)).await;
    add_action(
        &pool,
        wf,
        ActionConfig::Assignment(AssignmentConfig {
            tags: vec![tag],
            ..Default::default()
        }),
    )
    .await;

    let document = DocumentRepo::create(
        &pool,
        &CreateDocument {
            title: "old doc".into(),
            created: Some(chrono::Utc::now() - chrono::Duration::days(30)),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id;

    let engine = WorkflowEngine::new(pool.clone());

    let stats = sweep_once(&engine).await.unwrap();
    assert_eq!(stats.workflows, 1);
    assert_eq!(stats.fired, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(WorkflowRunRepo::count(&pool, wf, document).await.unwrap(), 1);

    let snapshot = DocumentRepo::snapshot(&pool, document).await.unwrap().unwrap();
    assert_eq!(snapshot.tags, [tag].into());

    // Second sweep: the ledger suppresses the non-recurring trigger.
    let stats = sweep_once(&engine).await.unwrap();
    assert_eq!(stats.fired, 0);
    assert_eq!(WorkflowRunRepo::count(&pool, wf, document).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn recurring_schedule_respects_interval(pool: PgPool) {
    let wf = workflow(&pool, "weekly-report", 0).await;
    let mut trigger = CreateTrigger::new(TriggerType::Scheduled);
    trigger.schedule_is_recurring = true;
    trigger.schedule_recurring_interval_days = 7;
    add_trigger(&pool, wf, trigger).await;
    add_action(
        &pool,
        wf,
        ActionConfig::Assignment(AssignmentConfig {
            tags: vec![TagRepo::create(&pool, "reported").await.unwrap()],
            ..Default::default()
        }),
    )
    .await;

    let document = DocumentRepo::create(
        &pool,
        &CreateDocument {
            title: "report source".into(),
            created: Some(chrono::Utc::now() - chrono::Duration::days(60)),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id;

    // Seed a run 8 days old: outside the 7-day interval, so it fires again.
    sqlx::query(
        "INSERT INTO workflow_runs (workflow_id, document_id, trigger_type, run_at)
         VALUES ($1, $2, 'scheduled', now() - interval '8 days')",
    )
    .bind(wf)
    .bind(document)
    .execute(&pool)
    .await
    .unwrap();

    let engine = WorkflowEngine::new(pool.clone());

    let stats = sweep_once(&engine).await.unwrap();
    assert_eq!(stats.fired, 1);
    assert_eq!(WorkflowRunRepo::count(&pool, wf, document).await.unwrap(), 2);

    // The run just recorded is well inside the interval: suppressed.
    let stats = sweep_once(&engine).await.unwrap();
    assert_eq!(stats.fired, 0);
    assert_eq!(WorkflowRunRepo::count(&pool, wf, document).await.unwrap(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn title_template_failure_keeps_title_and_applies_rest(pool: PgPool) {
    let owner = UserRepo::create(&pool, "bob").await.unwrap();

    let wf = workflow(&pool, "titler", 0).await;
    add_trigger(&pool, wf, CreateTrigger::new(TriggerType::DocumentAdded)).await;
    add_action(
        &pool,
        wf,
        ActionConfig::Assignment(AssignmentConfig {
            title: Some("{not_a_real_placeholder}".into()),
            owner: Some(owner),
            ..Default::default()
        }),
    )
    .await;

    let document = DocumentRepo::create(
        &pool,
        &CreateDocument {
            title: "Original title".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id;

    let engine = WorkflowEngine::new(pool.clone());
    let result = engine
        .run_workflows(TriggerType::DocumentAdded, document)
        .await
        .unwrap();
    assert_eq!(result.template_errors.len(), 1);

    let snapshot = DocumentRepo::snapshot(&pool, document).await.unwrap().unwrap();
    assert_eq!(snapshot.title, "Original title");
    assert_eq!(snapshot.owner.as_ref().unwrap().id, owner);
}

#[sqlx::test(migrations = "../../migrations")]
async fn malformed_webhook_params_skip_only_that_action(pool: PgPool) {
    let tag = TagRepo::create(&pool, "notified").await.unwrap();

    let wf = workflow(&pool, "notify-broken", 0).await;
    add_trigger(&pool, wf, CreateTrigger::new(TriggerType::DocumentUpdated)).await;
    add_action(
        &pool,
        wf,
        ActionConfig::Webhook(WebhookActionConfig {
            url: "https://hooks.example.com".into(),
            use_params: true,
            params: Some("{not valid json".into()),
            ..Default::default()
        }),
    )
    .await;
    add_action(
        &pool,
        wf,
        ActionConfig::Assignment(AssignmentConfig {
            tags: vec![tag],
            ..Default::default()
        }),
    )
    .await;

    let document = consumed_document(&pool, "doc.pdf").await;
    let engine = WorkflowEngine::new(pool.clone());
    let result = engine
        .run_workflows(TriggerType::DocumentUpdated, document)
        .await
        .unwrap();

    assert_eq!(result.notifications_queued, 0);
    assert_eq!(result.template_errors.len(), 1);
    assert!(result.template_errors[0].contains("params"));

    let snapshot = DocumentRepo::snapshot(&pool, document).await.unwrap().unwrap();
    assert_eq!(snapshot.tags, [tag].into());
}

#[sqlx::test(migrations = "../../migrations")]
async fn evaluate_only_reports_match_and_reason(pool: PgPool) {
    let wf = workflow(&pool, "png-only", 0).await;
    let mut trigger = CreateTrigger::new(TriggerType::Consumption);
    trigger.filter_filename = Some("*.png".into());
    add_trigger(&pool, wf, trigger).await;

    let engine = WorkflowEngine::new(pool.clone());

    let pdf = consumed_document(&pool, "scan.pdf").await;
    let outcome = engine.evaluate_only(pdf, wf).await.unwrap();
    assert!(!outcome.matched);
    assert!(outcome.reason.contains("filename"));

    let png = consumed_document(&pool, "scan.png").await;
    let outcome = engine.evaluate_only(png, wf).await.unwrap();
    assert!(outcome.matched);
}

#[sqlx::test(migrations = "../../migrations")]
async fn disabled_workflow_never_fires(pool: PgPool) {
    let tag = TagRepo::create(&pool, "should-not-appear").await.unwrap();

    let wf = workflow(&pool, "disabled", 0).await;
    add_trigger(&pool, wf, CreateTrigger::new(TriggerType::Consumption)).await;
    add_action(
        &pool,
        wf,
        ActionConfig::Assignment(AssignmentConfig {
            tags: vec![tag],
            ..Default::default()
        }),
    )
    .await;
    WorkflowRepo::set_enabled(&pool, wf, false).await.unwrap();

    let document = consumed_document(&pool, "doc.pdf").await;
    let engine = WorkflowEngine::new(pool.clone());
    let result = engine
        .run_workflows(TriggerType::Consumption, document)
        .await
        .unwrap();
    assert!(result.matched_workflows.is_empty());

    let snapshot = DocumentRepo::snapshot(&pool, document).await.unwrap().unwrap();
    assert!(snapshot.tags.is_empty());
}
