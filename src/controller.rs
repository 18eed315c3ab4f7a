use embedded_hal::PwmPin;

use crate::consts::MAX_DUTY_PERCENT;

/// Motor drive as the control loops see it: a duty percentage.
pub trait Motor {
    fn set_duty(&mut self, percent: u8);
    fn enable(&mut self);
    fn disable(&mut self);
}

/// Scales 0..=100 % onto `0..=max_duty`, rounding half up.
pub fn percent_to_duty(percent: u8, max_duty: u16) -> u16 {
    let percent = u32::from(percent.min(MAX_DUTY_PERCENT));
    ((percent * u32::from(max_duty) + 50) / 100) as u16
}

/// Fan motor on one PWM channel.
pub struct PwmMotor<P> {
    channel: P,
    max_pwm_duty: u16,
    percent: u8,
}

impl<P> PwmMotor<P>
where
    P: PwmPin<Duty = u16>,
{
    pub fn new(mut channel: P) -> Self {
        let max_pwm_duty = channel.get_max_duty();
        channel.set_duty(0);
        Self {
            channel,
            max_pwm_duty,
            percent: 0,
        }
    }

    /// Last commanded duty in percent.
    pub fn percent(&self) -> u8 {
        self.percent
    }
}

impl<P> Motor for PwmMotor<P>
where
    P: PwmPin<Duty = u16>,
{
    fn set_duty(&mut self, percent: u8) {
        let percent = percent.min(MAX_DUTY_PERCENT);
        if percent != self.percent {
            debug!("motor duty {=u8}%", percent);
        }
        self.percent = percent;
        self.channel
            .set_duty(percent_to_duty(percent, self.max_pwm_duty));
    }

    fn enable(&mut self) {
        self.channel.enable();
    }

    fn disable(&mut self) {
        self.channel.disable();
    }
}
