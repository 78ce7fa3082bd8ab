//! Recording sinks shared by unit tests.

use std::sync::Mutex;

use crate::animation::{MapSurface, MarkerPose};
use crate::route::Route;
use crate::tracker::{ClientState, StatusView};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapCall {
    DrawRoute(usize),
    Show(MarkerPose),
    Move(MarkerPose),
    Hide,
}

#[derive(Debug, Default)]
pub struct RecordingMap {
    calls: Mutex<Vec<MapCall>>,
}

impl RecordingMap {
    pub fn calls(&self) -> Vec<MapCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn moves(&self) -> Vec<MarkerPose> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MapCall::Move(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: MapCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl MapSurface for RecordingMap {
    fn draw_route(&self, route: &Route) {
        self.push(MapCall::DrawRoute(route.len()));
    }

    fn show_marker(&self, pose: MarkerPose) {
        self.push(MapCall::Show(pose));
    }

    fn move_marker(&self, pose: MarkerPose) {
        self.push(MapCall::Move(pose));
    }

    fn hide_marker(&self) {
        self.push(MapCall::Hide);
    }
}

#[derive(Debug, Default)]
pub struct RecordingStatus {
    states: Mutex<Vec<ClientState>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingStatus {
    pub fn states(&self) -> Vec<ClientState> {
        self.states.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl StatusView for RecordingStatus {
    fn show_status(&self, state: ClientState) {
        self.states.lock().unwrap().push(state);
    }

    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}
