pub const TOPIC_TEMPERATURE: &str = "lab1/temperature";
pub const TOPIC_PRESENCE: &str = "lab1/presence";

pub const TOPIC_AC_CMD: &str = "lab1/ac/cmd";
pub const TOPIC_AC_STATE: &str = "lab1/ac/state";
