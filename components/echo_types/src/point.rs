//! Fixed catalog of measurement points

use serde::{Deserialize, Serialize};
use std::fmt;

/// Grouping of measurement points
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Main loop
    Core,
    /// Major engine subsystems
    Subsystem,
    /// Scripting runtime (profiled on demand)
    Script,
    /// Host / mod defined slots
    Custom,
    /// Profiler self-diagnostics
    Internal,
}

impl Category {
    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Core => "Core",
            Category::Subsystem => "Subsystem",
            Category::Script => "Script",
            Category::Custom => "Custom",
            Category::Internal => "Internal",
        }
    }
}

/// A named place in the host application that can be timed
///
/// The catalog is closed: every point is known at compile time, which lets
/// the aggregator index statistics by [`MeasurementPoint::index`] instead of
/// hashing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasurementPoint {
    // Core
    Tick,
    Frame,
    // Subsystems
    Render,
    RenderWorld,
    RenderUi,
    Simulation,
    Physics,
    EntityAi,
    NpcAi,
    Network,
    Audio,
    ChunkIo,
    // Scripting
    ScriptEvent,
    ScriptFunction,
    ScriptGc,
    // Custom
    ModInit,
    ModTick,
    Custom1,
    Custom2,
    Custom3,
    Custom4,
    Custom5,
    // Internal
    ProfilerOverhead,
}

impl MeasurementPoint {
    /// Every point, in declaration order
    pub const ALL: [MeasurementPoint; 23] = [
        MeasurementPoint::Tick,
        MeasurementPoint::Frame,
        MeasurementPoint::Render,
        MeasurementPoint::RenderWorld,
        MeasurementPoint::RenderUi,
        MeasurementPoint::Simulation,
        MeasurementPoint::Physics,
        MeasurementPoint::EntityAi,
        MeasurementPoint::NpcAi,
        MeasurementPoint::Network,
        MeasurementPoint::Audio,
        MeasurementPoint::ChunkIo,
        MeasurementPoint::ScriptEvent,
        MeasurementPoint::ScriptFunction,
        MeasurementPoint::ScriptGc,
        MeasurementPoint::ModInit,
        MeasurementPoint::ModTick,
        MeasurementPoint::Custom1,
        MeasurementPoint::Custom2,
        MeasurementPoint::Custom3,
        MeasurementPoint::Custom4,
        MeasurementPoint::Custom5,
        MeasurementPoint::ProfilerOverhead,
    ];

    /// Number of points in the catalog
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index into per-point tables
    pub fn index(self) -> usize {
        self as usize
    }

    /// Category this point belongs to
    pub fn category(self) -> Category {
        use MeasurementPoint::*;
        match self {
            Tick | Frame => Category::Core,
            Render | RenderWorld | RenderUi | Simulation | Physics | EntityAi | NpcAi
            | Network | Audio | ChunkIo => Category::Subsystem,
            ScriptEvent | ScriptFunction | ScriptGc => Category::Script,
            ModInit | ModTick | Custom1 | Custom2 | Custom3 | Custom4 | Custom5 => {
                Category::Custom
            }
            ProfilerOverhead => Category::Internal,
        }
    }

    /// Human readable label
    pub fn display_name(self) -> &'static str {
        use MeasurementPoint::*;
        match self {
            Tick => "Game Tick",
            Frame => "Render Frame",
            Render => "Rendering",
            RenderWorld => "World Rendering",
            RenderUi => "UI Rendering",
            Simulation => "Simulation",
            Physics => "Physics",
            EntityAi => "Entity AI",
            NpcAi => "NPC AI",
            Network => "Network",
            Audio => "Audio",
            ChunkIo => "Chunk I/O",
            ScriptEvent => "Script Event",
            ScriptFunction => "Script Function",
            ScriptGc => "Script GC",
            ModInit => "Mod Initialization",
            ModTick => "Mod Tick Handler",
            Custom1 => "Custom 1",
            Custom2 => "Custom 2",
            Custom3 => "Custom 3",
            Custom4 => "Custom 4",
            Custom5 => "Custom 5",
            ProfilerOverhead => "Profiler Overhead",
        }
    }

    /// Whether this point is gated by the script-profiling switch
    pub fn is_script_related(self) -> bool {
        self.category() == Category::Script
    }

    /// Whether this is a host-defined slot
    pub fn is_custom(self) -> bool {
        self.category() == Category::Custom
    }

    /// Whether this is a profiler self-diagnostic point
    pub fn is_internal(self) -> bool {
        self.category() == Category::Internal
    }
}

impl fmt::Display for MeasurementPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
