#![allow(dead_code)]

use attendd::backend::{Backend, BackendError, LoginResponse};
use attendd::capture::{CameraDevice, CameraFault, CameraStream, CapturedImage, VideoConstraints};
use attendd::model::{
    AttendanceRecord, Classroom, ClassroomId, MarkAttendanceRequest, MarkAttendanceResponse,
    Student, StudentId,
};
use attendd::orchestrator::{AttendanceOrchestrator, WorkflowSettings};
use attendd::recognition::MarkFaceResponse;
use attendd::session::UserProfile;
use image::{ImageFormat, Rgb, RgbImage};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::rc::Rc;

pub const DATE: &str = "2025-10-12";
pub const CLASSROOM: ClassroomId = ClassroomId(1);

/// Shared view into the fake backend; the orchestrator owns the boxed
/// backend, tests keep this handle to script responses and count calls.
#[derive(Default)]
pub struct FakeState {
    pub students: RefCell<Vec<Student>>,
    pub saved: RefCell<HashMap<(i64, String), Vec<AttendanceRecord>>>,
    pub mark_face: RefCell<VecDeque<Result<MarkFaceResponse, BackendError>>>,
    pub save_error: RefCell<Option<BackendError>>,
    pub mark_face_calls: Cell<u32>,
    pub mark_calls: Cell<u32>,
    pub last_save: RefCell<Option<MarkAttendanceRequest>>,
    pub token: RefCell<Option<String>>,
}

impl FakeState {
    pub fn queue_recognition(&self, body: serde_json::Value) {
        let wire: MarkFaceResponse = serde_json::from_value(body).expect("wire response");
        self.mark_face.borrow_mut().push_back(Ok(wire));
    }

    pub fn queue_recognition_error(&self, e: BackendError) {
        self.mark_face.borrow_mut().push_back(Err(e));
    }

    pub fn network_calls(&self) -> u32 {
        self.mark_face_calls.get() + self.mark_calls.get()
    }
}

pub struct FakeBackend {
    pub state: Rc<FakeState>,
}

impl Backend for FakeBackend {
    fn set_token(&mut self, token: Option<String>) {
        *self.state.token.borrow_mut() = token;
    }

    fn login(&self, email: &str, password: &str) -> Result<LoginResponse, BackendError> {
        if password != "secret" {
            return Err(BackendError::Unauthorized);
        }
        Ok(LoginResponse {
            access_token: "tok-1".to_string(),
            user: UserProfile {
                id: 7,
                name: "Ms. Rivera".to_string(),
                email: email.to_string(),
                role: "teacher".to_string(),
            },
        })
    }

    fn list_classrooms(&self) -> Result<Vec<Classroom>, BackendError> {
        Ok(vec![Classroom {
            id: CLASSROOM,
            name: "Grade 5 A".to_string(),
            subject: Some("Science".to_string()),
        }])
    }

    fn list_students(&self, _classroom_id: ClassroomId) -> Result<Vec<Student>, BackendError> {
        Ok(self.state.students.borrow().clone())
    }

    fn attendance_for_date(
        &self,
        classroom_id: ClassroomId,
        date: &str,
    ) -> Result<Vec<AttendanceRecord>, BackendError> {
        Ok(self
            .state
            .saved
            .borrow()
            .get(&(classroom_id.0, date.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn mark_face(
        &self,
        _image: &CapturedImage,
        _classroom_id: ClassroomId,
        _date: &str,
    ) -> Result<MarkFaceResponse, BackendError> {
        self.state.mark_face_calls.set(self.state.mark_face_calls.get() + 1);
        self.state
            .mark_face
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Network("no scripted response".to_string())))
    }

    fn mark_attendance(&self, req: &MarkAttendanceRequest) -> Result<MarkAttendanceResponse, BackendError> {
        self.state.mark_calls.set(self.state.mark_calls.get() + 1);
        if let Some(e) = self.state.save_error.borrow_mut().take() {
            return Err(e);
        }
        let students = self.state.students.borrow();
        let records = req
            .attendance
            .iter()
            .map(|r| {
                let name = students
                    .iter()
                    .find(|s| s.id == r.student_id)
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                AttendanceRecord {
                    student_id: r.student_id,
                    student_name: name,
                    roll_no: None,
                    status: r.status.as_str().to_string(),
                    confidence: None,
                    distance: None,
                }
            })
            .collect();
        let key = (req.classroom_id.0, req.date.clone());
        let updated = self.state.saved.borrow().contains_key(&key);
        self.state.saved.borrow_mut().insert(key, records);
        *self.state.last_save.borrow_mut() = Some(req.clone());
        let n = req.attendance.len() as u32;
        Ok(if updated {
            MarkAttendanceResponse { marked: 0, updated: n }
        } else {
            MarkAttendanceResponse { marked: n, updated: 0 }
        })
    }

    fn base_url(&self) -> &str {
        "fake://backend"
    }
}

/// Camera whose preview turns ready after `ready_after` frame requests.
pub struct ScriptedCamera {
    pub fault: Option<CameraFault>,
    pub ready_after: u32,
    pub stops: Rc<Cell<u32>>,
}

struct ScriptedStream {
    polls: u32,
    ready_after: u32,
    stops: Rc<Cell<u32>>,
}

impl CameraDevice for ScriptedCamera {
    fn open(&self, _constraints: &VideoConstraints) -> Result<Box<dyn CameraStream>, CameraFault> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        Ok(Box::new(ScriptedStream {
            polls: 0,
            ready_after: self.ready_after,
            stops: self.stops.clone(),
        }))
    }
}

impl CameraStream for ScriptedStream {
    fn current_frame(&mut self) -> Option<RgbImage> {
        self.polls += 1;
        if self.polls <= self.ready_after {
            return None;
        }
        Some(RgbImage::from_pixel(64, 48, Rgb([120, 90, 60])))
    }

    fn stop_tracks(&mut self) {
        self.stops.set(self.stops.get() + 1);
    }
}

pub fn students(names: &[(i64, &str)]) -> Vec<Student> {
    names
        .iter()
        .map(|(id, name)| Student {
            id: StudentId(*id),
            name: name.to_string(),
            roll_no: Some(format!("R{}", id)),
        })
        .collect()
}

pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(8, 8, Rgb([10, 200, 30]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).expect("encode png");
    buf.into_inner()
}

pub struct Harness {
    pub orchestrator: AttendanceOrchestrator,
    pub backend: Rc<FakeState>,
    pub camera_stops: Rc<Cell<u32>>,
}

pub fn harness_with_camera(fault: Option<CameraFault>, ready_after: u32) -> Harness {
    let backend = Rc::new(FakeState::default());
    *backend.students.borrow_mut() = students(&[(1, "Ada"), (2, "Bea"), (3, "Cy")]);
    let stops = Rc::new(Cell::new(0));
    let orchestrator = AttendanceOrchestrator::new(
        Box::new(FakeBackend {
            state: backend.clone(),
        }),
        Box::new(ScriptedCamera {
            fault,
            ready_after,
            stops: stops.clone(),
        }),
        WorkflowSettings::default(),
        DATE,
    );
    Harness {
        orchestrator,
        backend,
        camera_stops: stops,
    }
}

pub fn harness() -> Harness {
    harness_with_camera(None, 0)
}
