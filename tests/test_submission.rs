use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use suitability::request::{AnalysisService, RequestBuilder, SubmissionController, SuitabilityRequest};
use suitability::stack::RasterStackModel;
use suitability::{ParameterField, SuitabilityError, SuitabilityResult};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sample_request(description: &str) -> SuitabilityRequest {
    let mut stack = RasterStackModel::new();
    stack.add("/Africa/Ethiopia/temp.tif", "temp", 5.0, 35.0).unwrap();
    stack.set_parameter("/Africa/Ethiopia/temp.tif", ParameterField::OptiFrom, 18.0).unwrap();
    stack.set_parameter("/Africa/Ethiopia/temp.tif", ParameterField::OptiTo, 27.0).unwrap();
    RequestBuilder::default()
        .build(&stack, None, description)
        .expect("Failed to build request")
}

/// Replays canned outcomes in order
struct ScriptedService {
    outcomes: Mutex<VecDeque<SuitabilityResult<String>>>,
}

impl ScriptedService {
    fn new(outcomes: Vec<SuitabilityResult<String>>) -> Self {
        Self { outcomes: Mutex::new(outcomes.into()) }
    }
}

impl AnalysisService for ScriptedService {
    fn process_land_suitability(&self, _request: &SuitabilityRequest) -> SuitabilityResult<String> {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SuitabilityError::NetworkFailure("no more outcomes".to_string())))
    }
}

/// Holds each submission until the test releases it
struct GatedService {
    release: Mutex<Receiver<()>>,
}

impl AnalysisService for GatedService {
    fn process_land_suitability(&self, request: &SuitabilityRequest) -> SuitabilityResult<String> {
        self.release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(10))
            .map_err(|e| SuitabilityError::NetworkFailure(e.to_string()))?;
        Ok(format!("/media/{}.tif", request.description()))
    }
}

#[test]
fn test_success_records_result() {
    init_logging();

    let controller = SubmissionController::new(ScriptedService::new(vec![Ok("/media/maize.tif".to_string())]));
    let reference = controller.submit(&sample_request("maize")).expect("Submission should succeed");

    assert_eq!(reference.url, "/media/maize.tif");
    assert_eq!(reference.description, "maize");
    assert_eq!(controller.last_result(), Some(reference));
    assert_eq!(controller.last_error(), None);
    assert!(!controller.is_pending());
}

#[test]
fn test_failure_keeps_previous_result() {
    init_logging();

    let controller = SubmissionController::new(ScriptedService::new(vec![
        Ok("/media/first.tif".to_string()),
        Err(SuitabilityError::ServerError("Raster not found".to_string())),
        Err(SuitabilityError::NetworkFailure("connection refused".to_string())),
    ]));

    controller.submit(&sample_request("first")).unwrap();

    let err = controller.submit(&sample_request("second")).unwrap_err();
    assert!(matches!(err, SuitabilityError::ServerError(ref m) if m == "Raster not found"));
    assert_eq!(controller.last_result().unwrap().url, "/media/first.tif");
    assert_eq!(controller.last_error().as_deref(), Some("Server error: Raster not found"));

    let err = controller.submit(&sample_request("third")).unwrap_err();
    assert!(matches!(err, SuitabilityError::NetworkFailure(_)));
    assert_eq!(controller.last_result().unwrap().url, "/media/first.tif");
    assert!(!controller.is_pending());
}

#[test]
fn test_second_submission_rejected_while_pending() {
    init_logging();

    let (release, gate) = channel();
    let controller = SubmissionController::new(GatedService { release: Mutex::new(gate) });
    let request = sample_request("gated");

    std::thread::scope(|scope| {
        let running = scope.spawn(|| controller.submit(&request));

        let start = Instant::now();
        while !controller.is_pending() {
            assert!(start.elapsed() < Duration::from_secs(5), "submission never started");
            std::thread::sleep(Duration::from_millis(5));
        }

        let err = controller.submit(&request).unwrap_err();
        assert!(matches!(err, SuitabilityError::SubmissionPending));

        release.send(()).unwrap();
        let reference = running.join().unwrap().expect("Gated submission should succeed");
        assert_eq!(reference.url, "/media/gated.tif");
    });

    assert!(!controller.is_pending());
}
