#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidConfig {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Integrator clamp, output units.
    pub clamp: f32,
}

#[derive(Debug)]
pub struct Pid {
    config: PidConfig,
    period_s: f32,
    integrator: f32,
    last_error: f32,
}

impl Pid {
    pub fn new(config: PidConfig, period_ms: u32) -> Self {
        Self {
            config,
            period_s: period_ms as f32 * 1e-3,
            integrator: 0.0,
            last_error: 0.0,
        }
    }

    pub fn update(&mut self, target: f32, observation: f32) -> f32 {
        let error = target - observation;

        self.integrator += error * self.config.ki * self.period_s;
        self.integrator = self
            .integrator
            .clamp(-self.config.clamp, self.config.clamp);

        let derivative = self.config.kd * (error - self.last_error) / self.period_s;
        self.last_error = error;

        self.config.kp * error + self.integrator + derivative
    }

    pub fn reset(&mut self) {
        self.integrator = 0.0;
        self.last_error = 0.0;
    }
}
