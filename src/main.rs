fn main() -> std::process::ExitCode {
    motor_voltage_lib::run()
}
