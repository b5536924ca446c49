// Unit tests for domain models

use super::*;

#[test]
fn test_file_ref_extension() {
    assert_eq!(FileRef::new("/tmp/in/Holiday.MOV", 10).extension(), "mov");
    assert_eq!(FileRef::new("/tmp/in/noext", 10).extension(), "mp4");
}

#[test]
fn test_terminal_states() {
    assert!(SessionState::Done.is_terminal());
    assert!(SessionState::Cancelled.is_terminal());
    assert!(!SessionState::Cutting.is_terminal());
}

#[test]
fn test_session_reset_clears_job() {
    let mut session = Session::new(UserId::from("42"));
    session.state = SessionState::Done;
    session.active_job = Some(ActiveJob::new(JobId::new(), CancellationToken::new()));
    assert!(!session.has_active_job());

    session.reset();
    assert_eq!(session.state, SessionState::Idle);
    assert!(session.active_job.is_none());
}

#[test]
fn test_job_plan_is_set_once() {
    let mut job = Job::new(JobId::new(), UserId::from("1"), FileRef::new("a.mp4", 1), 30);
    let first = PlanOutcome::WholeFile {
        entry: SegmentPlanEntry::new(0, 0.0, 10.0),
    };
    assert!(job.set_plan(first.clone()));
    assert!(!job.set_plan(first));
}

#[test]
fn test_job_outputs_stay_in_index_order() {
    let mut job = Job::new(JobId::new(), UserId::from("1"), FileRef::new("a.mp4", 1), 30);
    for index in [2, 0, 1] {
        job.push_output(SegmentOutput {
            index,
            path: PathBuf::from(format!("clip_{index}.mp4")),
            mode: CutMode::StreamCopy,
            drift: 0.0,
            attempts: 1,
        });
    }
    let order: Vec<usize> = job.outputs().iter().map(|o| o.index).collect();
    assert_eq!(order, vec![0, 1, 2]);
}

#[test]
fn test_job_id_round_trips_through_directory_name() {
    let id = JobId::new();
    assert_eq!(JobId::parse(&id.to_string()), Some(id));
    assert_eq!(JobId::parse("not-a-job"), None);
}
