//! RunStateMachine - 実行状態ルーター
//!
//! (current, requested) のペアから次状態と処置を決める純粋な状態表です。
//! I/O は一切行いません。副作用（spawn, IPC, タイマー）は orchestrator 側が
//! この表の結果を見て実行します。
//!
//! # 2つの表
//! - **primary table** (`transition`): 全 144 ペアに対して宣言済み。
//!   未宣言ペアは存在しない（抜けは設計バグでありランタイムケースではない）。
//! - **conversion table** (`convert`): action が `Convert` のペアについて、
//!   文脈依存の実際の次状態を引く二次表。たとえば Foreground 中の
//!   Launching 要求は、プロセスが生きているので実際には Relaunching。
//!
//! 2表を畳み込まずに分けているのは「構造的に合法」と「文脈で付け替え」を
//! 別々にテストできるようにするためです。
//!
//! # severity
//! 診断専用で挙動は変えません。orchestrator が tracing レベルに写すだけです。
//! `Error` は正常運用では起こらないはずの遷移、`Warn` は良性だが珍しい経路
//! （プロセス再生時の状態復元など）、`Check` は監査対象。

use super::life_status::LifeStatus;

/// What to do with a requested transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    /// `current` becomes `next` unconditionally.
    Set,

    /// The request is rejected; `current` is retained.
    Ignore,

    /// Structurally legal, but the literal next state needs the
    /// conversion table.
    Convert,
}

/// Diagnostic weight of a transition. Never changes behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RouteSeverity {
    None,
    Check,
    Warn,
    Error,
}

/// Immutable value returned by the primary table.
///
/// For `Ignore`, `next` equals the retained current state. For `Convert`,
/// `next` is the *requested* state and must not be applied before consulting
/// [`RunStateMachine::convert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDecision {
    pub next: LifeStatus,
    pub action: RouteAction,
    pub severity: RouteSeverity,
}

impl RouteDecision {
    const fn set(next: LifeStatus, severity: RouteSeverity) -> Self {
        Self {
            next,
            action: RouteAction::Set,
            severity,
        }
    }

    const fn ignore(current: LifeStatus, severity: RouteSeverity) -> Self {
        Self {
            next: current,
            action: RouteAction::Ignore,
            severity,
        }
    }

    const fn convert(requested: LifeStatus, severity: RouteSeverity) -> Self {
        Self {
            next: requested,
            action: RouteAction::Convert,
            severity,
        }
    }
}

/// Fully resolved outcome: conversion applied, closing override applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub next: LifeStatus,
    /// false なら Ignore（current 維持）
    pub accepted: bool,
    pub severity: RouteSeverity,
}

/// Pure state table. No I/O, no interior state; safe to share freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStateMachine;

impl RunStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Primary table: total over all (current, requested) pairs.
    pub fn transition(&self, current: LifeStatus, requested: LifeStatus) -> RouteDecision {
        use LifeStatus::*;
        use RouteSeverity as S;

        match current {
            Stop => match requested {
                Stop => RouteDecision::ignore(current, S::None),
                Preloading => RouteDecision::set(Preloading, S::None),
                Preloaded => RouteDecision::set(Preloaded, S::Warn),
                Splashing => RouteDecision::set(Splashing, S::None),
                Splashed => RouteDecision::set(Splashed, S::Warn),
                Launching => RouteDecision::set(Launching, S::None),
                // 死んでいるアプリの relaunch は実際には launch
                Relaunching => RouteDecision::convert(Relaunching, S::Check),
                Foreground => RouteDecision::set(Foreground, S::Warn),
                Background => RouteDecision::set(Background, S::Warn),
                Pausing => RouteDecision::ignore(current, S::Error),
                Paused => RouteDecision::set(Paused, S::Warn),
                Closing => RouteDecision::ignore(current, S::None),
            },

            Preloading => match requested {
                Stop => RouteDecision::set(Stop, S::Check),
                Preloading => RouteDecision::ignore(current, S::Check),
                Preloaded => RouteDecision::set(Preloaded, S::None),
                Splashing => RouteDecision::ignore(current, S::Warn),
                Splashed => RouteDecision::ignore(current, S::Warn),
                // プリロード中のフル起動要求は昇格
                Launching => RouteDecision::set(Launching, S::None),
                Relaunching => RouteDecision::convert(Relaunching, S::Check),
                Foreground => RouteDecision::set(Foreground, S::Warn),
                Background => RouteDecision::set(Background, S::Warn),
                Pausing => RouteDecision::ignore(current, S::Error),
                Paused => RouteDecision::ignore(current, S::Error),
                Closing => RouteDecision::set(Closing, S::None),
            },

            Preloaded => match requested {
                Stop => RouteDecision::set(Stop, S::Check),
                Preloading => RouteDecision::ignore(current, S::Check),
                Preloaded => RouteDecision::ignore(current, S::Check),
                // 温まったプロセスにスプラッシュは出さない
                Splashing => RouteDecision::ignore(current, S::Warn),
                Splashed => RouteDecision::ignore(current, S::Warn),
                Launching => RouteDecision::convert(Launching, S::None),
                Relaunching => RouteDecision::set(Relaunching, S::None),
                Foreground => RouteDecision::set(Foreground, S::None),
                Background => RouteDecision::set(Background, S::Check),
                Pausing => RouteDecision::ignore(current, S::Error),
                Paused => RouteDecision::ignore(current, S::Error),
                Closing => RouteDecision::set(Closing, S::None),
            },

            Splashing => match requested {
                Stop => RouteDecision::set(Stop, S::Check),
                Preloading => RouteDecision::ignore(current, S::Warn),
                Preloaded => RouteDecision::ignore(current, S::Warn),
                Splashing => RouteDecision::ignore(current, S::Check),
                Splashed => RouteDecision::set(Splashed, S::None),
                Launching => RouteDecision::set(Launching, S::None),
                // 初回起動がまだ終わっていないので relaunch にはならない
                Relaunching => RouteDecision::ignore(current, S::Check),
                Foreground => RouteDecision::set(Foreground, S::Warn),
                Background => RouteDecision::set(Background, S::Warn),
                Pausing => RouteDecision::ignore(current, S::Error),
                Paused => RouteDecision::ignore(current, S::Error),
                Closing => RouteDecision::set(Closing, S::None),
            },

            Splashed => match requested {
                Stop => RouteDecision::set(Stop, S::Check),
                Preloading => RouteDecision::ignore(current, S::Warn),
                Preloaded => RouteDecision::ignore(current, S::Warn),
                Splashing => RouteDecision::ignore(current, S::Check),
                Splashed => RouteDecision::ignore(current, S::Check),
                Launching => RouteDecision::set(Launching, S::None),
                Relaunching => RouteDecision::ignore(current, S::Check),
                Foreground => RouteDecision::set(Foreground, S::Warn),
                Background => RouteDecision::set(Background, S::Warn),
                Pausing => RouteDecision::ignore(current, S::Error),
                Paused => RouteDecision::ignore(current, S::Error),
                Closing => RouteDecision::set(Closing, S::None),
            },

            Launching => match requested {
                // spawn 失敗・即時終了
                Stop => RouteDecision::set(Stop, S::Check),
                Preloading => RouteDecision::ignore(current, S::Warn),
                Preloaded => RouteDecision::set(Preloaded, S::None),
                Splashing => RouteDecision::ignore(current, S::Check),
                Splashed => RouteDecision::ignore(current, S::Check),
                Launching => RouteDecision::ignore(current, S::Check),
                // 起動途中にパラメータ差し替えの relaunch が来た場合
                Relaunching => RouteDecision::set(Relaunching, S::Check),
                Foreground => RouteDecision::set(Foreground, S::None),
                Background => RouteDecision::set(Background, S::None),
                Pausing => RouteDecision::ignore(current, S::Error),
                Paused => RouteDecision::ignore(current, S::Error),
                Closing => RouteDecision::set(Closing, S::None),
            },

            Relaunching => match requested {
                Stop => RouteDecision::set(Stop, S::Check),
                Preloading => RouteDecision::ignore(current, S::Warn),
                Preloaded => RouteDecision::ignore(current, S::Warn),
                Splashing => RouteDecision::ignore(current, S::Check),
                Splashed => RouteDecision::ignore(current, S::Check),
                Launching => RouteDecision::ignore(current, S::Check),
                Relaunching => RouteDecision::ignore(current, S::Check),
                Foreground => RouteDecision::set(Foreground, S::None),
                Background => RouteDecision::set(Background, S::Check),
                Pausing => RouteDecision::ignore(current, S::Error),
                Paused => RouteDecision::ignore(current, S::Error),
                Closing => RouteDecision::set(Closing, S::None),
            },

            Foreground => match requested {
                // 予期しないプロセス死
                Stop => RouteDecision::set(Stop, S::Warn),
                Preloading => RouteDecision::ignore(current, S::Error),
                Preloaded => RouteDecision::ignore(current, S::Error),
                Splashing => RouteDecision::ignore(current, S::Warn),
                Splashed => RouteDecision::ignore(current, S::Warn),
                // 動作中アプリへの launch は relaunch の意図
                Launching => RouteDecision::convert(Launching, S::None),
                Relaunching => RouteDecision::set(Relaunching, S::None),
                Foreground => RouteDecision::ignore(current, S::Check),
                Background => RouteDecision::set(Background, S::None),
                Pausing => RouteDecision::set(Pausing, S::None),
                // pausing 段階を飛ばした直接報告
                Paused => RouteDecision::set(Paused, S::Warn),
                Closing => RouteDecision::set(Closing, S::None),
            },

            Background => match requested {
                Stop => RouteDecision::set(Stop, S::Warn),
                Preloading => RouteDecision::ignore(current, S::Error),
                Preloaded => RouteDecision::ignore(current, S::Warn),
                Splashing => RouteDecision::ignore(current, S::Warn),
                Splashed => RouteDecision::ignore(current, S::Warn),
                Launching => RouteDecision::convert(Launching, S::None),
                Relaunching => RouteDecision::set(Relaunching, S::None),
                Foreground => RouteDecision::set(Foreground, S::None),
                Background => RouteDecision::ignore(current, S::Check),
                Pausing => RouteDecision::set(Pausing, S::None),
                Paused => RouteDecision::set(Paused, S::Warn),
                Closing => RouteDecision::set(Closing, S::None),
            },

            Pausing => match requested {
                // pause 中にプロセスが落ちた
                Stop => RouteDecision::set(Stop, S::Check),
                Preloading => RouteDecision::ignore(current, S::Error),
                Preloaded => RouteDecision::ignore(current, S::Error),
                Splashing => RouteDecision::ignore(current, S::Warn),
                Splashed => RouteDecision::ignore(current, S::Warn),
                Launching => RouteDecision::convert(Launching, S::Check),
                Relaunching => RouteDecision::set(Relaunching, S::Check),
                // foreground イベントが pause を中断
                Foreground => RouteDecision::set(Foreground, S::Warn),
                Background => RouteDecision::ignore(current, S::Check),
                Pausing => RouteDecision::ignore(current, S::Check),
                Paused => RouteDecision::set(Paused, S::None),
                Closing => RouteDecision::set(Closing, S::None),
            },

            Paused => match requested {
                Stop => RouteDecision::set(Stop, S::Check),
                Preloading => RouteDecision::ignore(current, S::Error),
                Preloaded => RouteDecision::ignore(current, S::Warn),
                Splashing => RouteDecision::ignore(current, S::Warn),
                Splashed => RouteDecision::ignore(current, S::Warn),
                // launch による再開
                Launching => RouteDecision::convert(Launching, S::None),
                Relaunching => RouteDecision::set(Relaunching, S::None),
                Foreground => RouteDecision::set(Foreground, S::None),
                Background => RouteDecision::set(Background, S::Check),
                Pausing => RouteDecision::ignore(current, S::Check),
                Paused => RouteDecision::ignore(current, S::Check),
                Closing => RouteDecision::set(Closing, S::None),
            },

            Closing => match requested {
                Stop => RouteDecision::set(Stop, S::None),
                Preloading => RouteDecision::ignore(current, S::Check),
                Preloaded => RouteDecision::ignore(current, S::Check),
                Splashing => RouteDecision::ignore(current, S::Check),
                Splashed => RouteDecision::ignore(current, S::Check),
                Launching => RouteDecision::ignore(current, S::Check),
                Relaunching => RouteDecision::ignore(current, S::Check),
                // closing 中に届いた古い完了イベントは捨てる
                Foreground => RouteDecision::ignore(current, S::Warn),
                Background => RouteDecision::ignore(current, S::Warn),
                Pausing => RouteDecision::ignore(current, S::Check),
                Paused => RouteDecision::ignore(current, S::Warn),
                Closing => RouteDecision::ignore(current, S::Check),
            },
        }
    }

    /// Conversion table for `Convert` entries.
    ///
    /// Keyed by (current, requested); returns the true next state. Returns
    /// `None` for pairs the primary table does not mark as `Convert`.
    pub fn convert(&self, current: LifeStatus, requested: LifeStatus) -> Option<LifeStatus> {
        use LifeStatus::*;

        match (current, requested) {
            // 死んでいる/まだ生まれていないプロセスの relaunch は launch
            (Stop, Relaunching) | (Preloading, Relaunching) => Some(Launching),
            // 生きているプロセスへの launch は relaunch
            (Preloaded, Launching)
            | (Foreground, Launching)
            | (Background, Launching)
            | (Pausing, Launching)
            | (Paused, Launching) => Some(Relaunching),
            _ => None,
        }
    }

    /// Primary table + conversion + forced-closing override, in one step.
    ///
    /// This is what the orchestrator calls. Closing must always be
    /// requestable from a transitional state, even mid-launch, whatever the
    /// table says for that pair; duplicate close (current already Closing)
    /// stays an Ignore.
    pub fn resolve(&self, current: LifeStatus, requested: LifeStatus) -> ResolvedRoute {
        let decision = self.transition(current, requested);

        let decision = if requested == LifeStatus::Closing
            && current.is_transitional()
            && current != LifeStatus::Closing
            && decision.action != RouteAction::Set
        {
            RouteDecision::set(LifeStatus::Closing, RouteSeverity::Warn)
        } else {
            decision
        };

        match decision.action {
            RouteAction::Set => ResolvedRoute {
                next: decision.next,
                accepted: true,
                severity: decision.severity,
            },
            RouteAction::Ignore => ResolvedRoute {
                next: current,
                accepted: false,
                severity: decision.severity,
            },
            RouteAction::Convert => {
                // primary 表が Convert を返すペアには必ず変換が定義されている。
                // 抜けは設計バグなので debug_assert で捕まえ、リリースでは
                // requested をそのまま使う。
                let next = self.convert(current, requested);
                debug_assert!(
                    next.is_some(),
                    "missing conversion entry for ({current}, {requested})"
                );
                ResolvedRoute {
                    next: next.unwrap_or(decision.next),
                    accepted: true,
                    severity: decision.severity,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use LifeStatus::*;

    #[test]
    fn table_is_total_and_deterministic() {
        let machine = RunStateMachine::new();
        for current in LifeStatus::ALL {
            for requested in LifeStatus::ALL {
                let a = machine.transition(current, requested);
                let b = machine.transition(current, requested);
                assert_eq!(a, b, "({current}, {requested}) is not deterministic");
            }
        }
    }

    #[test]
    fn every_convert_entry_has_a_conversion() {
        let machine = RunStateMachine::new();
        for current in LifeStatus::ALL {
            for requested in LifeStatus::ALL {
                let decision = machine.transition(current, requested);
                match decision.action {
                    RouteAction::Convert => assert!(
                        machine.convert(current, requested).is_some(),
                        "({current}, {requested}) is Convert but has no conversion entry"
                    ),
                    _ => assert!(
                        machine.convert(current, requested).is_none(),
                        "({current}, {requested}) has a conversion entry but is not Convert"
                    ),
                }
            }
        }
    }

    #[test]
    fn ignore_retains_current_state() {
        let machine = RunStateMachine::new();
        for current in LifeStatus::ALL {
            for requested in LifeStatus::ALL {
                let decision = machine.transition(current, requested);
                if decision.action == RouteAction::Ignore {
                    assert_eq!(decision.next, current);
                }
            }
        }
    }

    #[rstest]
    // 新規起動の各段階
    #[case(Stop, Splashing, Splashing, true)]
    #[case(Splashing, Splashed, Splashed, true)]
    #[case(Splashed, Launching, Launching, true)]
    #[case(Launching, Foreground, Foreground, true)]
    // 動作中アプリへの launch は relaunch に変換される
    #[case(Foreground, Launching, Relaunching, true)]
    #[case(Background, Launching, Relaunching, true)]
    #[case(Paused, Launching, Relaunching, true)]
    // すでに foreground のアプリからの foreground 報告は無視
    #[case(Foreground, Foreground, Foreground, false)]
    // 二重 close は無視
    #[case(Closing, Closing, Closing, false)]
    // closing 中の古い起動完了イベントは捨てる
    #[case(Closing, Foreground, Closing, false)]
    // close 完了
    #[case(Closing, Stop, Stop, true)]
    // pause は foreground/background からのみ
    #[case(Foreground, Pausing, Pausing, true)]
    #[case(Splashing, Pausing, Splashing, false)]
    fn resolve_scenarios(
        #[case] current: LifeStatus,
        #[case] requested: LifeStatus,
        #[case] expected_next: LifeStatus,
        #[case] expected_accepted: bool,
    ) {
        let machine = RunStateMachine::new();
        let route = machine.resolve(current, requested);
        assert_eq!(route.next, expected_next);
        assert_eq!(route.accepted, expected_accepted);
    }

    #[test]
    fn closing_overrides_every_transitional_state() {
        let machine = RunStateMachine::new();
        for current in LifeStatus::ALL {
            if !current.is_transitional() || current == Closing {
                continue;
            }
            let route = machine.resolve(current, Closing);
            assert!(route.accepted, "close from {current} must be accepted");
            assert_eq!(route.next, Closing);
        }
    }

    #[test]
    fn close_on_stopped_instance_is_a_no_op() {
        let machine = RunStateMachine::new();
        let route = machine.resolve(Stop, Closing);
        assert!(!route.accepted);
        assert_eq!(route.next, Stop);
    }

    #[test]
    fn duplicate_launch_is_ignored_not_errored() {
        let machine = RunStateMachine::new();
        for current in [Launching, Relaunching] {
            let route = machine.resolve(current, Launching);
            assert!(!route.accepted, "launch during {current} must be ignored");
            assert!(route.severity < RouteSeverity::Error);
        }
    }

    #[test]
    fn respawn_recovery_paths_are_flagged_warn() {
        let machine = RunStateMachine::new();
        // 登録し直してきたランタイムの状態復元は通すが warn
        for requested in [Foreground, Background, Paused] {
            let decision = machine.transition(Stop, requested);
            assert_eq!(decision.action, RouteAction::Set);
            assert_eq!(decision.severity, RouteSeverity::Warn);
        }
    }
}
