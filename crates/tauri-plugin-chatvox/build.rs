const COMMANDS: &[&str] = &[
    "invoke",
    "start_capture",
    "stop_capture",
    "list_recordings",
    "play_audio",
    "stop_audio",
    "permission_result",
];

fn main() {
    tauri_plugin::Builder::new(COMMANDS).build();
}
