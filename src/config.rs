/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Player count that fills the session and triggers game start
    pub max_players: u32,
    /// Fixed simulation rate in Hz
    pub tick_rate: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_players: 4,
            tick_rate: 50,
        }
    }
}

impl SessionConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(max_players) = std::env::var("MAX_PLAYERS") {
            if let Ok(parsed) = max_players.parse::<u32>() {
                if parsed > 0 && parsed <= 64 {
                    config.max_players = parsed;
                } else {
                    tracing::warn!("MAX_PLAYERS must be 1-64, using default");
                }
            } else {
                tracing::warn!("Invalid MAX_PLAYERS '{}', using default", max_players);
            }
        }

        if let Ok(tick_rate) = std::env::var("TICK_RATE") {
            if let Ok(parsed) = tick_rate.parse::<u32>() {
                if parsed > 0 && parsed <= 240 {
                    config.tick_rate = parsed;
                } else {
                    tracing::warn!("TICK_RATE must be 1-240, using default");
                }
            } else {
                tracing::warn!("Invalid TICK_RATE '{}', using default", tick_rate);
            }
        }

        config
    }

    /// Fixed timestep in seconds derived from the tick rate
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.max_players == 0 {
            return Err("max_players must be at least 1".to_string());
        }
        if self.tick_rate == 0 {
            return Err("tick_rate must be at least 1".to_string());
        }
        Ok(())
    }
}
