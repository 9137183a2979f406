use async_trait::async_trait;
use parking_lot::Mutex;
use reverie_core::{Actor, ActorDirectory, ConnectionBootstrap, Goal, GoalStore, ReverieCoreError};
use reverie_protocol::{EventMsg, EventSink};
use uuid::Uuid;

/// Connection bootstrap stub that records calls and always succeeds.
#[derive(Default)]
pub struct NullBootstrap {
    pub calls: Mutex<Vec<(Uuid, Uuid)>>,
}

#[async_trait]
impl ConnectionBootstrap for NullBootstrap {
    async fn ensure_connection(
        &self,
        user_id: Uuid,
        room_id: Uuid,
        _user_name: &str,
        _user_screen_name: &str,
        _source: &str,
    ) -> Result<(), ReverieCoreError> {
        self.calls.lock().push((user_id, room_id));
        Ok(())
    }
}

/// Actor directory stub serving a fixed participant list.
#[derive(Default)]
pub struct StaticActors {
    actors: Vec<Actor>,
}

impl StaticActors {
    pub fn new(actors: Vec<Actor>) -> Self {
        Self { actors }
    }
}

#[async_trait]
impl ActorDirectory for StaticActors {
    async fn actors_for_room(&self, _room_id: Uuid) -> Result<Vec<Actor>, ReverieCoreError> {
        Ok(self.actors.clone())
    }
}

/// Goal store stub serving a fixed goal list.
#[derive(Default)]
pub struct StaticGoals {
    goals: Vec<Goal>,
}

impl StaticGoals {
    pub fn new(goals: Vec<Goal>) -> Self {
        Self { goals }
    }
}

#[async_trait]
impl GoalStore for StaticGoals {
    async fn goals_for_room(
        &self,
        _room_id: Uuid,
        count: usize,
    ) -> Result<Vec<Goal>, ReverieCoreError> {
        Ok(self.goals.iter().take(count).cloned().collect())
    }
}

/// Event sink that records every emitted event.
#[derive(Default)]
pub struct RecordingEventSink {
    pub events: Mutex<Vec<EventMsg>>,
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: EventMsg) {
        self.events.lock().push(event);
    }
}
