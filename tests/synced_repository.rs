mod common;

use chrono::Utc;
use common::{entity_id, sample_race, sample_run, stored, RecordingRemote, TestContext};
use stride_lib::application::ports::{LocalStore, RemotePage, SyncQueueStore};
use stride_lib::application::services::{RestoreState, SyncMode, SyncedRepository};
use stride_lib::domain::entities::{AthleteProfile, Race, Run, SyncEntity, TrainingPlan};
use stride_lib::domain::value_objects::{SyncOperationType, SyncQueueStatus};
use stride_lib::infrastructure::http::ApiError;
use stride_lib::shared::error::AppError;

fn durable<T: SyncEntity>(ctx: &TestContext) -> SyncedRepository<T> {
    SyncedRepository::new(
        ctx.store::<T>(),
        ctx.auth_port(),
        SyncMode::Durable(ctx.queue_port()),
    )
}

fn remote_run(server_id: &str) -> Run {
    let mut run = sample_run();
    run.sync.server_id = Some(server_id.to_string());
    run
}

#[tokio::test]
async fn save_writes_locally_and_queues_one_upload() {
    let ctx = TestContext::new().await;
    let repository = durable::<Run>(&ctx);

    let saved = repository.save(sample_run()).await.expect("save");
    repository.save(saved.clone()).await.expect("save again");

    let pending = ctx.queue.pending_items().await.expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].operation_type, SyncOperationType::RunUpload);
    assert_eq!(pending[0].entity_id, saved.id);
    assert_eq!(pending[0].status, SyncQueueStatus::Pending);

    let local = repository.get(&saved.id).await.expect("get").expect("stored");
    assert_eq!(local.notes.as_deref(), Some("tempo"));
    assert_eq!(
        repository.sync_status(&saved.id).await.expect("status"),
        Some(SyncQueueStatus::Pending)
    );
}

#[tokio::test]
async fn invalid_entities_are_rejected_before_any_write() {
    let ctx = TestContext::new().await;
    let repository = durable::<Run>(&ctx);
    let mut run = sample_run();
    run.duration_secs = 0;

    let err = repository.save(run.clone()).await.expect_err("invalid");
    assert!(matches!(err, AppError::ValidationError(_)));
    assert!(stored(&ctx.store::<Run>(), &run.id).await.is_none());
    assert_eq!(ctx.queue.pending_count().await.expect("count"), 0);
}

#[tokio::test]
async fn update_of_unknown_id_is_not_found() {
    let ctx = TestContext::new().await;
    let repository = durable::<Race>(&ctx);

    let err = repository
        .update(sample_race("Unknown 10K"))
        .await
        .expect_err("missing");
    assert!(err.is_not_found());
    assert_eq!(ctx.queue.pending_count().await.expect("count"), 0);
}

#[tokio::test]
async fn update_keeps_server_metadata_from_local_row() {
    let ctx = TestContext::new().await;
    let store = ctx.store::<Race>();
    let mut race = sample_race("City Marathon");
    race.sync.server_id = Some("srv-race".into());
    store.upsert(&race).await.expect("seed");

    let mut edited = race.clone();
    edited.sync.server_id = None;
    edited.name = "City Marathon 2026".into();
    let updated = durable::<Race>(&ctx).update(edited).await.expect("update");

    assert_eq!(updated.remote_id(), Some("srv-race"));
    let local = stored(&store, &race.id).await.expect("stored");
    assert_eq!(local.name, "City Marathon 2026");
    assert_eq!(local.sync.server_id.as_deref(), Some("srv-race"));
}

#[tokio::test]
async fn deleting_a_missing_run_is_idempotent() {
    let ctx = TestContext::new().await;
    let repository = durable::<Run>(&ctx);

    repository
        .delete(&entity_id("never-saved"))
        .await
        .expect("missing run delete is a no-op");
    assert_eq!(ctx.queue.pending_count().await.expect("count"), 0);

    let err = durable::<Race>(&ctx)
        .delete(&entity_id("never-saved"))
        .await
        .expect_err("missing race");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn delete_removes_locally_and_queues_remote_delete() {
    let ctx = TestContext::new().await;
    let repository = durable::<Run>(&ctx);
    let run = repository.save(sample_run()).await.expect("save");

    repository.delete(&run.id).await.expect("delete");

    assert!(stored(&ctx.store::<Run>(), &run.id).await.is_none());
    let operations: Vec<_> = ctx
        .queue
        .pending_items()
        .await
        .expect("pending")
        .into_iter()
        .map(|item| item.operation_type)
        .collect();
    assert_eq!(
        operations,
        vec![SyncOperationType::RunUpload, SyncOperationType::RunDelete]
    );
}

#[tokio::test]
async fn replace_all_keeps_only_the_latest_profile() {
    let ctx = TestContext::new().await;
    let repository = durable::<AthleteProfile>(&ctx);

    repository
        .save(AthleteProfile::new("First"))
        .await
        .expect("first");
    let second = repository
        .save(AthleteProfile::new("Second"))
        .await
        .expect("second");

    let profiles = repository.list().await.expect("list");
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].id, second.id);
    assert_eq!(profiles[0].display_name, "Second");
}

#[tokio::test]
async fn empty_store_is_restored_once_across_pages() {
    let ctx = TestContext::new().await;
    let remote = RecordingRemote::<Run>::new();
    remote.push_page(Ok(RemotePage {
        items: vec![remote_run("srv-1"), remote_run("srv-2")],
        next_cursor: Some("page-2".into()),
        has_more: true,
    }));
    remote.push_page(Ok(RemotePage::last(vec![remote_run("srv-3")])));

    let repository = durable::<Run>(&ctx)
        .with_remote(remote.clone())
        .with_restore_page_size(2);

    let runs = repository.list().await.expect("list");
    assert_eq!(runs.len(), 3);
    assert_eq!(remote.fetch_count(), 2);
    assert_eq!(
        repository.restore_state().await,
        RestoreState::Restored { count: 3 }
    );

    ctx.store::<Run>()
        .delete(&runs[0].id)
        .await
        .expect("local delete");
    repository.get(&entity_id("absent")).await.expect("get");
    assert_eq!(remote.fetch_count(), 2);
    assert_eq!(ctx.queue.pending_count().await.expect("count"), 0);
}

#[tokio::test]
async fn failed_restore_serves_local_data_and_latches() {
    let ctx = TestContext::new().await;
    let remote = RecordingRemote::<Run>::new();
    remote.push_page(Err(ApiError::Transport("connection refused".into())));
    let repository = durable::<Run>(&ctx).with_remote(remote.clone());

    assert!(repository.list().await.expect("list").is_empty());
    assert!(repository.list().await.expect("list").is_empty());
    assert_eq!(remote.fetch_count(), 1);
    assert_eq!(repository.restore_state().await, RestoreState::Failed);

    repository.reset_restore_state().await;
    remote.push_page(Ok(RemotePage::last(vec![remote_run("srv-9")])));
    assert_eq!(repository.list().await.expect("list").len(), 1);
    assert_eq!(remote.fetch_count(), 2);
}

#[tokio::test]
async fn restore_waits_for_authentication() {
    let ctx = TestContext::new().await;
    ctx.auth.sign_out();
    let remote = RecordingRemote::<Run>::new();
    remote.push_page(Ok(RemotePage::last(vec![remote_run("srv-1")])));
    let repository = durable::<Run>(&ctx).with_remote(remote.clone());

    assert!(repository.list().await.expect("list").is_empty());
    assert_eq!(remote.fetch_count(), 0);
    assert_eq!(repository.restore_state().await, RestoreState::NotAttempted);

    ctx.auth.sign_in();
    assert_eq!(repository.list().await.expect("list").len(), 1);
}

#[tokio::test]
async fn lookup_miss_never_overwrites_local_edits() {
    let ctx = TestContext::new().await;
    let remote = RecordingRemote::<Run>::new();
    let repository = durable::<Run>(&ctx).with_remote(remote.clone());

    let run = repository
        .save(sample_run().with_notes("local edit"))
        .await
        .expect("save");
    let mut stale = run.clone();
    stale.notes = Some("stale server copy".into());
    stale.sync.server_id = Some("srv-stale".into());
    remote.push_page(Ok(RemotePage::last(vec![stale, remote_run("srv-other")])));

    let missing = repository.get(&entity_id("absent")).await.expect("get");
    assert!(missing.is_none());
    assert_eq!(remote.fetch_count(), 0);
    assert_eq!(repository.restore_state().await, RestoreState::NotAttempted);

    let local = stored(&ctx.store::<Run>(), &run.id).await.expect("stored");
    assert_eq!(local.notes.as_deref(), Some("local edit"));
    assert_eq!(repository.list().await.expect("list").len(), 1);
}

#[tokio::test]
async fn training_plan_restores_as_single_resource() {
    let ctx = TestContext::new().await;
    let remote = RecordingRemote::<TrainingPlan>::new();
    let mut plan = TrainingPlan::new("Marathon build", Utc::now(), 16);
    plan.sync.server_id = Some("srv-plan".into());
    remote.push_page(Ok(RemotePage::last(vec![plan.clone()])));
    let repository = durable::<TrainingPlan>(&ctx).with_remote(remote.clone());

    let plans = repository.list().await.expect("list");
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].id, plan.id);
    assert_eq!(
        repository.restore_state().await,
        RestoreState::Restored { count: 1 }
    );

    let replacement = repository
        .save(TrainingPlan::new("Recovery", Utc::now(), 4))
        .await
        .expect("save");
    let plans = repository.list().await.expect("list");
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].id, replacement.id);
    assert_eq!(
        ctx.store::<TrainingPlan>()
            .tombstone(&plan.id)
            .await
            .expect("tombstone"),
        None
    );
}

#[tokio::test]
async fn delete_keeps_server_id_for_the_queued_delete() {
    let ctx = TestContext::new().await;
    let repository = durable::<Run>(&ctx);
    let mut run = repository.save(sample_run()).await.expect("save");
    run.sync.server_id = Some("srv-kept".into());
    ctx.store::<Run>().upsert(&run).await.expect("synced row");

    repository.delete(&run.id).await.expect("delete");

    assert_eq!(
        ctx.store::<Run>().tombstone(&run.id).await.expect("tombstone"),
        Some("srv-kept".to_string())
    );
}

#[tokio::test]
async fn best_effort_delete_targets_the_server_id() {
    let ctx = TestContext::new().await;
    let remote = RecordingRemote::<Run>::new();
    let repository = SyncedRepository::new(ctx.store::<Run>(), ctx.auth_port(), SyncMode::BestEffort)
        .with_remote(remote.clone());

    let run = repository.save(sample_run()).await.expect("save");
    repository.flush_background().await;
    repository.delete(&run.id).await.expect("delete");
    repository.flush_background().await;

    assert_eq!(
        remote.calls(),
        vec![format!("upload:{}", run.id), format!("delete:srv-{}", run.id)]
    );
    assert_eq!(
        ctx.store::<Run>().tombstone(&run.id).await.expect("tombstone"),
        None
    );
}

#[tokio::test]
async fn best_effort_delete_of_unsynced_entity_stays_local() {
    let ctx = TestContext::new().await;
    let remote = RecordingRemote::<Run>::new();
    ctx.auth.sign_out();
    let repository = SyncedRepository::new(ctx.store::<Run>(), ctx.auth_port(), SyncMode::BestEffort)
        .with_remote(remote.clone());

    let run = repository.save(sample_run()).await.expect("save");
    ctx.auth.sign_in();
    repository.delete(&run.id).await.expect("delete");
    repository.flush_background().await;

    assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn best_effort_mode_uploads_in_background() {
    let ctx = TestContext::new().await;
    let remote = RecordingRemote::<Run>::new();
    let repository = SyncedRepository::new(ctx.store::<Run>(), ctx.auth_port(), SyncMode::BestEffort)
        .with_remote(remote.clone());

    let run = repository.save(sample_run()).await.expect("save");
    repository.flush_background().await;

    assert_eq!(remote.calls(), vec![format!("upload:{}", run.id)]);
    assert_eq!(remote.keys(), vec![None]);
    assert_eq!(ctx.queue.pending_count().await.expect("count"), 0);
    assert_eq!(repository.sync_status(&run.id).await.expect("status"), None);

    let local = stored(&ctx.store::<Run>(), &run.id).await.expect("stored");
    assert_eq!(
        local.sync.server_id.as_deref(),
        Some(format!("srv-{}", run.id).as_str())
    );
}

#[tokio::test]
async fn best_effort_failure_still_keeps_local_write() {
    let ctx = TestContext::new().await;
    let remote = RecordingRemote::<Run>::new();
    remote.push_result(Err(ApiError::Server {
        status: 500,
        message: "boom".into(),
    }));
    let repository = SyncedRepository::new(ctx.store::<Run>(), ctx.auth_port(), SyncMode::BestEffort)
        .with_remote(remote.clone());

    let run = repository.save(sample_run()).await.expect("save");
    repository.flush_background().await;

    assert_eq!(remote.call_count(), 1);
    let local = stored(&ctx.store::<Run>(), &run.id).await.expect("stored");
    assert!(local.sync.server_id.is_none());
}

#[tokio::test]
async fn local_only_mode_never_touches_the_network() {
    let ctx = TestContext::new().await;
    let remote = RecordingRemote::<Run>::new();
    let repository = SyncedRepository::new(ctx.store::<Run>(), ctx.auth_port(), SyncMode::LocalOnly)
        .with_remote(remote.clone());

    let run = repository.save(sample_run()).await.expect("save");
    repository.delete(&run.id).await.expect("delete");
    repository.flush_background().await;

    assert_eq!(remote.call_count(), 0);
    assert_eq!(ctx.queue.pending_count().await.expect("count"), 0);
}

#[tokio::test]
async fn publish_and_revoke_go_through_the_queue() {
    let ctx = TestContext::new().await;
    let repository = durable::<Run>(&ctx);
    let run = repository.save(sample_run()).await.expect("save");

    repository.publish_activity(&run.id).await.expect("publish");
    assert_eq!(
        ctx.queue
            .cancel(&run.id, SyncOperationType::ActivityPublish)
            .await
            .expect("probe cancel"),
        1
    );

    repository.publish_activity(&run.id).await.expect("publish");
    repository.revoke_share(&run.id).await.expect("revoke");
    let operations: Vec<_> = ctx
        .queue
        .pending_items()
        .await
        .expect("pending")
        .into_iter()
        .map(|item| item.operation_type)
        .collect();
    assert_eq!(
        operations,
        vec![SyncOperationType::RunUpload, SyncOperationType::ShareRevoke]
    );

    let err = repository
        .publish_activity(&entity_id("missing-run"))
        .await
        .expect_err("missing");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn activity_sharing_requires_durable_mode() {
    let ctx = TestContext::new().await;
    let repository = SyncedRepository::<Run>::new(
        ctx.store::<Run>(),
        ctx.auth_port(),
        SyncMode::LocalOnly,
    );
    let run = repository.save(sample_run()).await.expect("save");

    let err = repository
        .publish_activity(&run.id)
        .await
        .expect_err("not durable");
    assert!(matches!(err, AppError::ConfigurationError(_)));
}
