mod helpers;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use dragoman::application::ports::{EventBus, HandlerError, JobRepository, StreamMessage};
use dragoman::application::services::{
    ConsumerConfig, Disposition, Orchestrator, OrchestratorError, RetryPolicy, StreamConsumer,
};
use dragoman::domain::{EventKind, FileStatus, JobId, JobStatus, Stage, StreamName};

use helpers::{
    MP3, PDF, Pipeline, job_created, seed_job, stage_completed, stage_failed,
    translation_completed,
};

#[tokio::test]
async fn given_one_document_and_two_languages_when_pipeline_runs_then_two_translations_fan_out_and_postprocessing_starts_once()
 {
    let pipeline = Pipeline::new();
    let (job, files) = seed_job(
        &*pipeline.repository,
        &["es", "fr"],
        &[("report.pdf", PDF)],
        json!({}),
    )
    .await;
    let file = &files[0];

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Parsing);
    assert_eq!(pipeline.file(file.id).await.status, FileStatus::Parsing);
    let parse_requests = pipeline.bus.messages(StreamName::Parsing).await;
    assert_eq!(parse_requests.len(), 1);
    assert_eq!(
        parse_requests[0].event_type().as_deref(),
        Some("file.parse")
    );

    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Parsing, file))
        .await
        .unwrap();
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Translating);
    assert!(pipeline.bus.messages(StreamName::Transcription).await.is_empty());

    let translate_requests = pipeline.bus.messages(StreamName::Translation).await;
    let mut languages: Vec<String> = translate_requests
        .iter()
        .map(|m| m.get_str("target_language").unwrap())
        .collect();
    languages.sort();
    assert_eq!(languages, vec!["es", "fr"]);

    pipeline.record_translation(&job, file, "es").await;
    pipeline
        .orchestrator
        .apply(&translation_completed(&job, file, "es"))
        .await
        .unwrap();
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Translating);
    assert!(pipeline.bus.messages(StreamName::Postprocessing).await.is_empty());

    pipeline.record_translation(&job, file, "fr").await;
    pipeline
        .orchestrator
        .apply(&translation_completed(&job, file, "fr"))
        .await
        .unwrap();

    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Postprocessing);
    assert_eq!(pipeline.file(file.id).await.status, FileStatus::Completed);
    let postprocess = pipeline.bus.messages(StreamName::Postprocessing).await;
    assert_eq!(postprocess.len(), 1);
    assert_eq!(
        postprocess[0].get("target_languages"),
        Some(&json!(["es", "fr"]))
    );
}

#[tokio::test]
async fn given_many_files_and_languages_when_completions_are_replayed_then_fan_in_fires_once() {
    let pipeline = Pipeline::new();
    let (job, files) = seed_job(
        &*pipeline.repository,
        &["de", "es", "fr"],
        &[("a.pdf", PDF), ("b.pdf", PDF)],
        json!({}),
    )
    .await;

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    for file in &files {
        pipeline
            .orchestrator
            .apply(&stage_completed(&job, Stage::Parsing, file))
            .await
            .unwrap();
    }
    assert_eq!(pipeline.bus.messages(StreamName::Translation).await.len(), 6);

    for file in &files {
        for language in ["de", "es", "fr"] {
            pipeline.record_translation(&job, file, language).await;
        }
    }
    for _ in 0..2 {
        for file in &files {
            for language in ["de", "es", "fr"] {
                pipeline
                    .orchestrator
                    .apply(&translation_completed(&job, file, language))
                    .await
                    .unwrap();
            }
        }
    }

    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Postprocessing);
    assert_eq!(pipeline.bus.messages(StreamName::Postprocessing).await.len(), 1);
    let started = pipeline
        .event_types(job.id)
        .await
        .into_iter()
        .filter(|t| t == "postprocessing.started")
        .count();
    assert_eq!(started, 1);
}

#[tokio::test]
async fn given_audio_and_document_when_parsed_then_only_audio_is_transcribed() {
    let pipeline = Pipeline::new();
    let (job, files) = seed_job(
        &*pipeline.repository,
        &["es"],
        &[("talk.mp3", MP3), ("slides.pdf", PDF)],
        json!({}),
    )
    .await;
    let (audio, document) = (&files[0], &files[1]);

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Parsing, audio))
        .await
        .unwrap();
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Parsing);

    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Parsing, document))
        .await
        .unwrap();
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Transcribing);
    assert_eq!(pipeline.file(audio.id).await.status, FileStatus::Transcribing);
    assert_eq!(pipeline.file(document.id).await.status, FileStatus::Translating);

    let transcribe_requests = pipeline.bus.messages(StreamName::Transcription).await;
    assert_eq!(transcribe_requests.len(), 1);
    assert_eq!(
        transcribe_requests[0].get_str("file_id"),
        Some(audio.id.to_string())
    );
    assert!(pipeline.bus.messages(StreamName::Translation).await.is_empty());

    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Transcribing, audio))
        .await
        .unwrap();
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Translating);
    assert_eq!(pipeline.bus.messages(StreamName::Translation).await.len(), 2);
}

#[tokio::test]
async fn given_parsing_completed_replayed_when_applied_then_no_duplicate_requests() {
    let pipeline = Pipeline::new();
    let (job, files) = seed_job(
        &*pipeline.repository,
        &["es", "fr"],
        &[("report.pdf", PDF)],
        json!({}),
    )
    .await;
    let completed = stage_completed(&job, Stage::Parsing, &files[0]);

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    pipeline.orchestrator.apply(&completed).await.unwrap();
    pipeline.orchestrator.apply(&completed).await.unwrap();

    assert_eq!(pipeline.bus.messages(StreamName::Parsing).await.len(), 1);
    assert_eq!(pipeline.bus.messages(StreamName::Translation).await.len(), 2);
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Translating);
}

#[tokio::test]
async fn given_parsing_failed_when_applied_then_job_fails_and_later_events_are_ignored() {
    let pipeline = Pipeline::new();
    let (job, files) = seed_job(
        &*pipeline.repository,
        &["es"],
        &[("a.pdf", PDF), ("b.pdf", PDF)],
        json!({}),
    )
    .await;

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    pipeline
        .orchestrator
        .apply(&stage_failed(&job, Stage::Parsing, &files[0], "corrupt pdf"))
        .await
        .unwrap();

    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Failed);
    assert_eq!(pipeline.file(files[0].id).await.status, FileStatus::Failed);
    assert!(pipeline.event_types(job.id).await.contains(&"job.failed".to_string()));

    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Parsing, &files[1]))
        .await
        .unwrap();
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Failed);
    assert!(pipeline.bus.messages(StreamName::Translation).await.is_empty());

    let notifications: Vec<String> = pipeline
        .bus
        .messages(StreamName::Events)
        .await
        .iter()
        .filter_map(|m| m.event_type())
        .collect();
    assert_eq!(notifications, vec!["job.failed"]);
}

#[tokio::test]
async fn given_completed_event_reporting_failure_when_applied_then_job_fails() {
    let pipeline = Pipeline::new();
    let (job, files) =
        seed_job(&*pipeline.repository, &["es"], &[("a.pdf", PDF)], json!({})).await;

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    let message = stage_completed(&job, Stage::Parsing, &files[0])
        .with("success", false)
        .with("error", "timeout");
    pipeline.orchestrator.apply(&message).await.unwrap();

    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Failed);
}

#[tokio::test]
async fn given_human_review_when_postprocessing_completes_then_job_waits_for_review() {
    let pipeline = Pipeline::new();
    let (job, files) = seed_job(
        &*pipeline.repository,
        &["es"],
        &[("report.pdf", PDF)],
        json!({"human_review": true, "delivery_formats": ["docx"]}),
    )
    .await;
    let file = &files[0];

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Parsing, file))
        .await
        .unwrap();
    pipeline.record_translation(&job, file, "es").await;
    pipeline
        .orchestrator
        .apply(&translation_completed(&job, file, "es"))
        .await
        .unwrap();

    let postprocess = pipeline.bus.messages(StreamName::Postprocessing).await;
    assert_eq!(postprocess[0].get("delivery_formats"), Some(&json!(["docx"])));

    pipeline
        .orchestrator
        .apply(&StreamMessage::new(
            EventKind::StageCompleted(Stage::Postprocessing),
            job.id,
        ))
        .await
        .unwrap();
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Review);

    pipeline
        .orchestrator
        .apply(&StreamMessage::new(EventKind::ReviewCompleted, job.id))
        .await
        .unwrap();
    let finished = pipeline.job(job.id).await;
    assert_eq!(finished.status, JobStatus::Completed);
    assert!(finished.completed_at.is_some());

    let events = pipeline.event_types(job.id).await;
    assert!(events.contains(&"review.required".to_string()));
    assert!(events.contains(&"job.completed".to_string()));
}

#[tokio::test]
async fn given_no_review_when_postprocessing_completes_then_job_completes() {
    let pipeline = Pipeline::new();
    let (job, files) =
        seed_job(&*pipeline.repository, &["es"], &[("a.pdf", PDF)], json!({})).await;
    let file = &files[0];

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Parsing, file))
        .await
        .unwrap();
    pipeline.record_translation(&job, file, "es").await;
    pipeline
        .orchestrator
        .apply(&translation_completed(&job, file, "es"))
        .await
        .unwrap();
    pipeline
        .orchestrator
        .apply(&StreamMessage::new(
            EventKind::StageCompleted(Stage::Postprocessing),
            job.id,
        ))
        .await
        .unwrap();

    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn given_translation_artifact_not_recorded_when_completion_arrives_then_retry_is_requested() {
    let pipeline = Pipeline::new();
    let (job, files) =
        seed_job(&*pipeline.repository, &["es"], &[("a.pdf", PDF)], json!({})).await;

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Parsing, &files[0]))
        .await
        .unwrap();

    let result = pipeline
        .orchestrator
        .apply(&translation_completed(&job, &files[0], "es"))
        .await;

    assert!(matches!(result, Err(OrchestratorError::NotYetVisible(_))));
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Translating);
}

#[tokio::test]
async fn given_translation_completed_without_language_when_applied_then_job_fails() {
    let pipeline = Pipeline::new();
    let (job, files) =
        seed_job(&*pipeline.repository, &["es"], &[("a.pdf", PDF)], json!({})).await;

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Parsing, &files[0]))
        .await
        .unwrap();
    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Translating, &files[0]))
        .await
        .unwrap();

    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Failed);
}

#[tokio::test]
async fn given_job_without_files_when_created_event_arrives_then_job_fails() {
    let pipeline = Pipeline::new();
    let (job, _) = seed_job(&*pipeline.repository, &["es"], &[], json!({})).await;

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();

    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Failed);
    assert!(pipeline.bus.messages(StreamName::Parsing).await.is_empty());
}

#[tokio::test]
async fn given_unknown_job_when_event_arrives_then_retry_is_requested() {
    let pipeline = Pipeline::new();

    let result = pipeline
        .orchestrator
        .apply(&StreamMessage::new(EventKind::JobCreated, JobId::new()))
        .await;

    let error = result.unwrap_err();
    assert!(matches!(error, OrchestratorError::JobNotFound(_)));
    assert!(matches!(HandlerError::from(error), HandlerError::Retry(_)));
}

#[tokio::test]
async fn given_malformed_envelope_when_applied_then_message_is_discarded() {
    let pipeline = Pipeline::new();
    let missing_job = StreamMessage::default().with("event", "job.created");
    let unknown_event = StreamMessage::default()
        .with("event", "job.exploded")
        .with("job_id", JobId::new().to_string());

    for message in [missing_job, unknown_event] {
        let error = pipeline.orchestrator.apply(&message).await.unwrap_err();
        assert!(matches!(error, OrchestratorError::Malformed(_)));
        assert!(matches!(HandlerError::from(error), HandlerError::Discard(_)));
    }
}

#[tokio::test]
async fn given_informational_event_for_unknown_job_when_applied_then_it_is_acknowledged() {
    let pipeline = Pipeline::new();

    let result = pipeline
        .orchestrator
        .apply(&StreamMessage::new(EventKind::JobCompleted, JobId::new()))
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn given_glossary_setting_when_translation_fans_out_then_requests_carry_glossary_id() {
    let pipeline = Pipeline::new();
    let glossary_id = uuid::Uuid::new_v4();
    let (job, files) = seed_job(
        &*pipeline.repository,
        &["es"],
        &[("a.pdf", PDF)],
        json!({"glossary_id": glossary_id.to_string()}),
    )
    .await;

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Parsing, &files[0]))
        .await
        .unwrap();

    let requests = pipeline.bus.messages(StreamName::Translation).await;
    assert_eq!(requests[0].get_str("glossary_id"), Some(glossary_id.to_string()));
}

fn second_orchestrator(pipeline: &Pipeline) -> Orchestrator {
    Orchestrator::new(pipeline.repository.clone(), pipeline.bus.clone())
        .with_retry_policy(RetryPolicy::none())
}

fn file_ids(messages: &[StreamMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|m| m.get_str("file_id").unwrap())
        .collect()
}

#[tokio::test]
async fn given_event_that_never_becomes_applicable_when_dead_lettered_then_job_fails() {
    let pipeline = Pipeline::new();
    let (job, files) = seed_job(&*pipeline.repository, &["es"], &[("a.pdf", PDF)], json!({})).await;
    pipeline
        .repository
        .transition_status(job.id, &[JobStatus::Created], JobStatus::Translating)
        .await
        .unwrap();
    pipeline
        .bus
        .ensure_group(StreamName::Events, "orchestrator")
        .await
        .unwrap();
    pipeline
        .bus
        .publish(
            StreamName::Events,
            &translation_completed(&job, &files[0], "es"),
        )
        .await
        .unwrap();

    let mut config = ConsumerConfig::new("orchestrator", "orchestrator-1");
    config.block = Duration::ZERO;
    config.min_idle = Duration::ZERO;
    config.max_deliveries = 2;
    let consumer = StreamConsumer::new(
        pipeline.bus.clone(),
        StreamName::Events,
        Arc::new(second_orchestrator(&pipeline)),
        config,
    );

    assert_eq!(consumer.poll_once().await.unwrap(), vec![Disposition::Pending]);
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Translating);
    assert_eq!(
        consumer.claim_pass().await.unwrap(),
        vec![Disposition::DeadLettered]
    );

    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Failed);
    assert_eq!(pipeline.bus.messages(StreamName::DeadLetter).await.len(), 1);
    let events = pipeline.repository.list_events(job.id).await.unwrap();
    let failure = events
        .iter()
        .find(|e| e.event_type == "job.failed")
        .unwrap();
    assert!(failure.message.starts_with("handler error"));
    assert_eq!(failure.meta["event"], json!("translating.completed"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_two_orchestrators_when_last_completions_race_then_each_fan_out_happens_once() {
    let pipeline = Pipeline::new();
    let rival = second_orchestrator(&pipeline);
    let (job, files) = seed_job(
        &*pipeline.repository,
        &["es", "fr"],
        &[("a.pdf", PDF), ("b.pdf", PDF)],
        json!({}),
    )
    .await;
    let (first, second) = (&files[0], &files[1]);

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    let first_event = stage_completed(&job, Stage::Parsing, first);
    let second_event = stage_completed(&job, Stage::Parsing, second);
    let (a, b) = tokio::join!(
        pipeline.orchestrator.apply(&first_event),
        rival.apply(&second_event),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Translating);
    assert_eq!(pipeline.bus.messages(StreamName::Translation).await.len(), 4);

    pipeline.record_translation(&job, first, "es").await;
    pipeline
        .orchestrator
        .apply(&translation_completed(&job, first, "es"))
        .await
        .unwrap();
    pipeline.record_translation(&job, first, "fr").await;
    pipeline
        .orchestrator
        .apply(&translation_completed(&job, first, "fr"))
        .await
        .unwrap();
    pipeline.record_translation(&job, second, "es").await;
    pipeline.record_translation(&job, second, "fr").await;

    let es_event = translation_completed(&job, second, "es");
    let fr_event = translation_completed(&job, second, "fr");
    let (a, b) = tokio::join!(
        pipeline.orchestrator.apply(&es_event),
        rival.apply(&fr_event),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Postprocessing);
    assert_eq!(pipeline.bus.messages(StreamName::Postprocessing).await.len(), 1);
    assert_eq!(pipeline.bus.messages(StreamName::Translation).await.len(), 4);
    let started: Vec<String> = pipeline
        .event_types(job.id)
        .await
        .into_iter()
        .filter(|t| t.ends_with(".started"))
        .collect();
    assert_eq!(
        started,
        vec!["parsing.started", "translating.started", "postprocessing.started"]
    );
}

#[tokio::test]
async fn given_early_transcript_when_last_file_is_parsed_then_only_the_rest_is_transcribed() {
    let pipeline = Pipeline::new();
    let (job, files) = seed_job(
        &*pipeline.repository,
        &["es"],
        &[("a.mp3", MP3), ("b.mp3", MP3)],
        json!({}),
    )
    .await;
    let (early, late) = (&files[0], &files[1]);

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Parsing, early))
        .await
        .unwrap();
    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Transcribing, early))
        .await
        .unwrap();
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Parsing);
    assert_eq!(pipeline.file(early.id).await.status, FileStatus::Translating);

    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Parsing, late))
        .await
        .unwrap();
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Transcribing);
    let transcriptions = pipeline.bus.messages(StreamName::Transcription).await;
    assert_eq!(file_ids(&transcriptions), vec![late.id.to_string()]);

    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Transcribing, late))
        .await
        .unwrap();
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Translating);
    assert_eq!(pipeline.bus.messages(StreamName::Transcription).await.len(), 1);
    let mut translated = file_ids(&pipeline.bus.messages(StreamName::Translation).await);
    translated.sort();
    let mut expected = vec![early.id.to_string(), late.id.to_string()];
    expected.sort();
    assert_eq!(translated, expected);
}

#[tokio::test]
async fn given_every_transcript_already_in_when_parsing_finishes_then_translation_starts_directly() {
    let pipeline = Pipeline::new();
    let (job, files) = seed_job(&*pipeline.repository, &["es"], &[("a.mp3", MP3)], json!({})).await;

    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();
    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Transcribing, &files[0]))
        .await
        .unwrap();
    pipeline
        .orchestrator
        .apply(&stage_completed(&job, Stage::Parsing, &files[0]))
        .await
        .unwrap();

    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Translating);
    assert!(pipeline.bus.messages(StreamName::Transcription).await.is_empty());
    assert_eq!(pipeline.bus.messages(StreamName::Translation).await.len(), 1);
}

#[tokio::test]
async fn given_stage_advanced_without_fan_out_when_resuming_then_only_missing_work_is_reissued() {
    let pipeline = Pipeline::new();
    let (job, files) = seed_job(
        &*pipeline.repository,
        &["es", "fr"],
        &[("a.pdf", PDF)],
        json!({}),
    )
    .await;
    pipeline
        .repository
        .transition_status(job.id, &[JobStatus::Created], JobStatus::Translating)
        .await
        .unwrap();
    pipeline.record_translation(&job, &files[0], "es").await;

    let resumed = pipeline
        .orchestrator
        .resume_stalled(Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(resumed, 1);
    let requests = pipeline.bus.messages(StreamName::Translation).await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].get_str("target_language").as_deref(), Some("fr"));
    assert!(requests[0].get_str("request_id").is_some());
}

#[tokio::test]
async fn given_queued_job_never_announced_when_resuming_then_parsing_starts() {
    let pipeline = Pipeline::new();
    let (job, files) = seed_job(&*pipeline.repository, &["es"], &[("a.pdf", PDF)], json!({})).await;
    pipeline
        .repository
        .transition_status(job.id, &[JobStatus::Created], JobStatus::Queued)
        .await
        .unwrap();

    let resumed = pipeline
        .orchestrator
        .resume_stalled(Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(resumed, 1);
    assert_eq!(pipeline.job(job.id).await.status, JobStatus::Parsing);
    assert_eq!(pipeline.file(files[0].id).await.status, FileStatus::Parsing);
    assert_eq!(pipeline.bus.messages(StreamName::Parsing).await.len(), 1);
}

#[tokio::test]
async fn given_recently_advanced_job_when_resuming_then_nothing_is_reissued() {
    let pipeline = Pipeline::new();
    let (job, _) = seed_job(&*pipeline.repository, &["es"], &[("a.pdf", PDF)], json!({})).await;
    pipeline.orchestrator.apply(&job_created(&job)).await.unwrap();

    let resumed = pipeline
        .orchestrator
        .resume_stalled(Duration::from_secs(600))
        .await
        .unwrap();

    assert_eq!(resumed, 0);
    assert_eq!(pipeline.bus.messages(StreamName::Parsing).await.len(), 1);
}
