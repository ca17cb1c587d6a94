use crate::app::Vec2;
use crate::content::ImageId;

pub const ACTOR_ARRIVAL_THRESHOLD: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Idle,
    Moving,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    position: Vec2,
    target: Vec2,
    direction: Vec2,
    speed: f32,
    feet_offset: Vec2,
    image: ImageId,
    sort_key: f32,
    state: ActorState,
}

impl Actor {
    pub fn new(position: Vec2, speed: f32, feet_offset: Vec2, image: ImageId) -> Self {
        Self {
            position,
            target: position,
            direction: Vec2::default(),
            speed: speed.max(0.0),
            feet_offset,
            image,
            sort_key: position.y,
            state: ActorState::Idle,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    pub fn image(&self) -> ImageId {
        self.image
    }

    pub fn sort_key(&self) -> f32 {
        self.sort_key
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    pub fn is_moving(&self) -> bool {
        self.state == ActorState::Moving
    }

    pub fn sprite_position(&self) -> Vec2 {
        self.position - self.feet_offset
    }

    pub fn set_target(&mut self, target: Vec2) {
        if !target.x.is_finite() || !target.y.is_finite() {
            return;
        }
        self.target = target;
        if target == self.position {
            self.direction = Vec2::default();
            self.state = ActorState::Idle;
            return;
        }
        self.state = ActorState::Moving;
    }

    pub fn update(&mut self, dt_seconds: f32) -> bool {
        if self.state == ActorState::Idle {
            return false;
        }

        let remaining = self.target - self.position;
        let distance = remaining.length();
        if distance < ACTOR_ARRIVAL_THRESHOLD {
            self.arrive();
            return true;
        }

        self.direction = Vec2 {
            x: remaining.x / distance,
            y: remaining.y / distance,
        };
        let step = self.speed * dt_seconds.max(0.0);
        if step >= distance {
            self.arrive();
            return true;
        }
        if step == 0.0 {
            return false;
        }
        self.position = self.position + self.direction * step;
        self.sort_key = self.position.y;
        true
    }

    fn arrive(&mut self) {
        self.position = self.target;
        self.direction = Vec2::default();
        self.sort_key = self.position.y;
        self.state = ActorState::Idle;
    }
}
