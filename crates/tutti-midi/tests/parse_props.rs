use proptest::prelude::*;
use tutti_midi::{CommandKind, MidiCommand};

proptest! {
    #[test]
    fn parse_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = MidiCommand::parse_all(&bytes);
    }

    #[test]
    fn channel_commands_reparse(channel in 0u8..16, a in 0u8..128, b in 0u8..128) {
        let commands = [
            MidiCommand::note_on(channel, a, b),
            MidiCommand::note_off(channel, a, b),
            MidiCommand::control_change(channel, a, b),
            MidiCommand::program_change(channel, a),
            MidiCommand::poly_pressure(channel, a, b),
        ];
        for cmd in commands {
            let (parsed, used) = MidiCommand::from_bytes(cmd.as_bytes()).unwrap();
            prop_assert_eq!(used, cmd.len());
            prop_assert_eq!(parsed.kind().channel(), Some(channel));
            prop_assert_eq!(parsed, cmd);
        }
    }

    #[test]
    fn sysex_payload_survives(payload in proptest::collection::vec(0u8..128, 0..32)) {
        let cmd = MidiCommand::sysex(&payload);
        let reparsed = MidiCommand::try_from(cmd.as_bytes()).unwrap();
        prop_assert_eq!(reparsed.kind(), CommandKind::SysEx(payload.as_slice()));
    }
}
