use std::collections::VecDeque;

use crate::geo::{GeoPoint, ScreenPoint, ViewTransform};
use crate::map::{EntityId, WaterNodeId};
use crate::spatial::SelectedEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Enter,
    Escape,
}

/// Raw input, already translated from the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown(ScreenPoint),
    PointerMove(ScreenPoint),
    PointerUp(ScreenPoint),
    /// Positive steps zoom in.
    Wheel(f64),
    Key(Key),
    Resize { width: u32, height: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModeRequest {
    Normal,
    OrientBridge {
        bridge_id: EntityId,
        orientation: f64,
    },
    PlaceWaterPoint,
    CreateWaterRoute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    Normal,
    OrientBridge,
    PlaceWaterPoint,
    CreateWaterRoute,
}

impl ModeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModeKind::Normal => "normal",
            ModeKind::OrientBridge => "orient_bridge",
            ModeKind::PlaceWaterPoint => "place_water_point",
            ModeKind::CreateWaterRoute => "create_water_route",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterPointRejection {
    OnLand,
    TooCloseToExisting,
}

/// Everything the controller tells its consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    SelectionChanged(Option<SelectedEntity>),
    ViewChanged(ViewTransform),
    ModeChanged {
        from: ModeKind,
        to: ModeKind,
    },
    BridgeOrientationCommitted {
        bridge_id: EntityId,
        orientation: f64,
    },
    BridgeOrientationReverted {
        bridge_id: EntityId,
        orientation: f64,
    },
    WaterPointPlaced(GeoPoint),
    WaterPointRejected {
        position: GeoPoint,
        reason: WaterPointRejection,
    },
    WaterRouteSaved {
        from: WaterNodeId,
        to: WaterNodeId,
        intermediate_points: Vec<GeoPoint>,
    },
    PathRecomputeRequested,
}

#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: VecDeque<ControllerEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: ControllerEvent) {
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<ControllerEvent> {
        self.events.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = ControllerEvent> + '_ {
        self.events.drain(..)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
